use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::application::use_cases::update_toolchain::{
    UpdateToolchainConfig, UpdateToolchainUseCase,
};
use crate::common::context::Context;
use crate::infrastructure::filesystem::{DefaultPackageInstaller, FeedStore};
use crate::infrastructure::network::HttpFetcher;
use crate::infrastructure::scm::SvnCli;

/// Handler for the toolchain update command
pub struct ToolchainUpdateCommand {
    pub feed: String,
    pub dir: PathBuf,
}

impl ToolchainUpdateCommand {
    pub fn new(feed: String, dir: PathBuf) -> Self {
        Self { feed, dir }
    }

    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fetcher = match ctx.command_timeout {
            Some(timeout) => HttpFetcher::with_timeout(timeout)?,
            None => HttpFetcher::new()?,
        };
        let svn = Arc::new(SvnCli::new().with_timeout(ctx.command_timeout));
        let installer = DefaultPackageInstaller::new(fetcher.clone(), svn)
            .with_timeout(ctx.command_timeout);
        let config = UpdateToolchainConfig::new(self.feed.clone(), self.dir.clone());

        println!(
            "{} Updating toolchain in {} from {}",
            "::".blue().bold(),
            self.dir.display(),
            self.feed
        );
        let report =
            UpdateToolchainUseCase::new(ctx, FeedStore::new(fetcher), Arc::new(installer), config)
                .execute()
                .await?;

        for package in &report.plan.to_remove {
            println!("{} {}", "-".red().bold(), describe(&package.name, &package.version));
        }
        for package in &report.plan.to_add {
            println!("{} {}", "+".green().bold(), describe(&package.name, &package.version));
        }
        for package in &report.plan.to_update {
            println!("{} {}", "*".blue().bold(), package.name);
        }
        for failure in &report.failures {
            println!("{} {}: {}", "*".red().bold(), failure.name.bold(), failure.message);
        }

        if report.is_success() {
            println!(
                "{} Toolchain has {} packages",
                "✓".green().bold(),
                report.packages.len()
            );
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Failed to update {} packages",
                report.failures.len()
            ))
        }
    }
}

fn describe(name: &str, version: &Option<String>) -> String {
    match version {
        Some(version) => format!("{} {}", name, version),
        None => name.to_string(),
    }
}
