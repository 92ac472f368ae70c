use anyhow::Result;
use colored::Colorize;

use super::{git_client, print_outcomes};
use crate::application::use_cases::sync_worktree::{
    GroupChange, SyncReport, SyncWorktreeConfig, SyncWorktreeUseCase,
};
use crate::common::context::Context;

/// Handler for the sync, add-group and rm-group commands
pub struct SyncCommand {
    config: SyncWorktreeConfig,
}

impl Default for SyncCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncCommand {
    pub fn new() -> Self {
        Self {
            config: SyncWorktreeConfig::default(),
        }
    }

    /// Groups given on the command line replace the configured ones
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        if !groups.is_empty() {
            self.config = self.config.with_group_change(GroupChange::Replace(groups));
        }
        self
    }

    pub fn with_all(mut self, all: bool) -> Self {
        if all {
            self.config = self.config.with_all_repos(true);
        }
        self
    }

    pub fn with_correct_branch(mut self, correct_branch: bool) -> Self {
        self.config = self.config.with_correct_branch(correct_branch);
        self
    }

    pub fn adding_group(mut self, group: String) -> Self {
        self.config = self.config.with_group_change(GroupChange::Add(group));
        self
    }

    pub fn removing_group(mut self, group: String) -> Self {
        self.config = self.config.with_group_change(GroupChange::Remove(group));
        self
    }

    pub fn without_manifest_update(mut self) -> Self {
        self.config = self.config.with_update_manifest(false);
        self
    }

    pub async fn execute(self, ctx: Context) -> Result<()> {
        let client = git_client(&ctx);
        println!("{} Synchronizing worktree", "::".blue().bold());

        let report = SyncWorktreeUseCase::new(ctx, client, self.config)
            .execute()
            .await?;
        print_report(&report);

        if report.is_success() {
            println!("{} Synchronization completed", "✓".green().bold());
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Failed to synchronize {} repositories",
                report.errors().len()
            ))
        }
    }
}

fn print_report(report: &SyncReport) {
    let plan = &report.plan;
    for repo in &plan.to_remove {
        println!("{} {}", "-".red().bold(), repo.src);
    }
    for repo in &plan.to_add {
        println!("{} {}", "+".green().bold(), repo.src);
    }
    for repo_move in &plan.to_move {
        println!(
            "{} {} -> {}",
            "~".cyan().bold(),
            repo_move.old.src,
            repo_move.new.src
        );
    }
    for update in &plan.to_update {
        println!("{} {}", "*".blue().bold(), update.new.src);
    }
    if report.plan_only {
        if plan.is_empty() {
            println!("Nothing to do");
        }
        return;
    }

    for result in report.repos.iter().filter(|r| !r.success) {
        println!(
            "{} {} {}: {}",
            "*".red().bold(),
            result.action,
            result.src.bold(),
            result.message
        );
    }
    print_outcomes(&report.branches);
}
