use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use super::{git_client, print_outcomes};
use crate::application::use_cases::snapshot_worktree::{
    GenerateSnapshotUseCase, RestoreSnapshotUseCase,
};
use crate::common::context::Context;

/// Handler for the snapshot command
pub struct SnapshotCommand {
    pub path: PathBuf,
}

impl SnapshotCommand {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let client = git_client(ctx);
        let snapshot = GenerateSnapshotUseCase::new(ctx, client.as_ref(), self.path.clone())
            .execute()
            .await?;
        println!(
            "{} Recorded {} repositories in {}",
            "✓".green().bold(),
            snapshot.refs.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Handler for the restore command
pub struct RestoreCommand {
    pub path: PathBuf,
}

impl RestoreCommand {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub async fn execute(&self, ctx: Context) -> Result<()> {
        let client = git_client(&ctx);
        println!(
            "{} Restoring snapshot {}",
            "::".blue().bold(),
            self.path.display()
        );
        let outcomes = RestoreSnapshotUseCase::new(ctx, client, self.path.clone())
            .execute()
            .await?;
        print_outcomes(&outcomes);

        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        if failed == 0 {
            println!("{} Snapshot restored", "✓".green().bold());
            Ok(())
        } else {
            Err(anyhow::anyhow!("Failed to restore {} repositories", failed))
        }
    }
}
