use anyhow::Result;
use colored::Colorize;

use super::sync::SyncCommand;
use super::git_client;
use crate::application::use_cases::init_worktree::{InitWorktreeConfig, InitWorktreeUseCase};
use crate::common::context::Context;

/// Handler for the init command
pub struct InitCommand {
    pub url: String,
    pub branch: Option<String>,
    pub groups: Vec<String>,
    pub all: bool,
    pub fixed_ref: Option<String>,
}

impl InitCommand {
    pub fn new(
        url: String,
        branch: Option<String>,
        groups: Vec<String>,
        all: bool,
        fixed_ref: Option<String>,
    ) -> Self {
        Self {
            url,
            branch,
            groups,
            all,
            fixed_ref,
        }
    }

    /// Write the worktree configuration, then run a first sync
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let mut config = InitWorktreeConfig::new(self.url.clone())
            .with_groups(self.groups.clone())
            .with_all_repos(self.all);
        if let Some(branch) = &self.branch {
            config = config.with_branch(branch.clone());
        }
        if let Some(fixed_ref) = &self.fixed_ref {
            config = config.with_fixed_ref(fixed_ref.clone());
        }

        let client = git_client(ctx);
        println!(
            "{} Initializing worktree in {}",
            "::".blue().bold(),
            ctx.worktree_root.display()
        );
        InitWorktreeUseCase::new(ctx, client.as_ref(), config)
            .execute()
            .await?;

        // the manifest was just fetched
        SyncCommand::new()
            .without_manifest_update()
            .execute(ctx.clone())
            .await
    }
}
