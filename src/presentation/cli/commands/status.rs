use anyhow::Result;
use colored::Colorize;

use super::git_client;
use crate::application::use_cases::worktree_status::{WorktreeStatus, WorktreeStatusUseCase};
use crate::common::context::Context;
use crate::domain::entities::worktree::LocalRepoState;

/// Handler for the status command
pub struct StatusCommand {
    /// Also list clean repositories
    pub all: bool,
}

impl StatusCommand {
    pub fn new(all: bool) -> Self {
        Self { all }
    }

    pub async fn execute(&self, ctx: Context) -> Result<()> {
        let client = git_client(&ctx);
        let status = WorktreeStatusUseCase::new(ctx, client).execute().await?;
        self.print_status(&status);
        Ok(())
    }

    fn print_status(&self, status: &WorktreeStatus) {
        let not_clean: Vec<&LocalRepoState> = status.not_clean().collect();
        for repo in &status.repos {
            if self.all || not_clean.iter().any(|r| r.project.src == repo.project.src) {
                println!("{}", format_repo(repo));
            }
        }
        for src in &status.missing {
            println!("{} {} {}", "?".red().bold(), src.bold(), "(missing)".red());
        }

        if not_clean.is_empty() && status.missing.is_empty() {
            println!("{} All repositories are clean", "✓".green().bold());
        } else {
            println!(
                "{} {} of {} repositories need attention",
                "⚠".yellow().bold(),
                not_clean.len() + status.missing.len(),
                status.repos.len() + status.missing.len()
            );
        }
    }
}

fn format_repo(repo: &LocalRepoState) -> String {
    let state = if repo.clean {
        "✓".green()
    } else {
        "M".yellow()
    };
    let branch = match (&repo.current_branch, &repo.project.fixed_ref) {
        (_, Some(fixed_ref)) => format!("@{}", fixed_ref).cyan(),
        (Some(branch), None) if repo.on_default_branch() => branch.normal(),
        (Some(branch), None) => {
            let expected = repo
                .project
                .default_branch()
                .map(|b| b.name.as_str())
                .unwrap_or("?");
            format!("{} (should be {})", branch, expected).red()
        }
        (None, None) => "(detached)".red(),
    };

    let mut line = format!("{} {} {}", state, repo.project.src.bold(), branch);
    if repo.ahead > 0 {
        line.push_str(&format!(" ↑{}", repo.ahead));
    }
    if repo.behind > 0 {
        line.push_str(&format!(" ↓{}", repo.behind));
    }
    line
}
