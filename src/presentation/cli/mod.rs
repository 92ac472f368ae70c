pub mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::env;
use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;

use crate::common::context::Context;
use commands::{
    DepsCommand, InitCommand, RestoreCommand, SnapshotCommand, StatusCommand, SyncCommand,
    ToolchainUpdateCommand,
};

/// wtree - keeps a worktree of git repositories in sync with a manifest
#[derive(Parser)]
#[command(name = "wtree")]
#[command(about = "Keeps a worktree of git repositories in sync with a manifest")]
#[command(version = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("WTREE_GIT_HASH"),
    " ",
    env!("WTREE_BUILD_DATE"),
    ")"
))]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Worktree directory (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    /// Number of parallel jobs
    #[arg(short, long, global = true, default_value_t = 1)]
    pub jobs: usize,

    /// Timeout in seconds for each git/svn process
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a worktree from a manifest repository
    Init {
        /// Url of the manifest repository
        url: String,

        /// Branch of the manifest repository
        #[arg(short, long)]
        branch: Option<String>,

        /// Groups to use
        #[arg(short, long)]
        group: Vec<String>,

        /// Use every repository of the manifest
        #[arg(long)]
        all: bool,

        /// Pin the manifest to a fixed ref
        #[arg(long = "ref")]
        fixed_ref: Option<String>,
    },

    /// Synchronize the worktree with the manifest
    Sync {
        /// Replace the configured groups
        #[arg(short, long)]
        group: Vec<String>,

        /// Use every repository of the manifest
        #[arg(long)]
        all: bool,

        /// Only show what would be changed
        #[arg(long)]
        dry_run: bool,

        /// Don't switch to the configured branch
        #[arg(long)]
        no_correct_branch: bool,
    },

    /// Add a group to the worktree and synchronize
    AddGroup {
        /// Group to add
        group: String,
    },

    /// Remove a group from the worktree and synchronize
    RmGroup {
        /// Group to remove
        group: String,
    },

    /// Show the state of each repository
    Status {
        /// Also list clean repositories
        #[arg(short, long)]
        all: bool,
    },

    /// Record the current commit of each repository
    Snapshot {
        /// Output file
        path: PathBuf,
    },

    /// Reset each repository to the commit recorded in a snapshot
    Restore {
        /// Snapshot file
        path: PathBuf,

        /// Only show what would be changed
        #[arg(long)]
        dry_run: bool,
    },

    /// Resolve the build order of projects and packages
    Deps {
        /// Project names or paths
        #[arg(required = true)]
        projects: Vec<String>,

        /// Follow runtime dependencies instead of build dependencies
        #[arg(long)]
        runtime: bool,

        /// Also follow test dependencies
        #[arg(long)]
        test: bool,

        /// Toolchain directory providing packages
        #[arg(long)]
        toolchain: Option<PathBuf>,

        /// Fail on dependency cycles
        #[arg(long)]
        strict: bool,
    },

    /// Manage toolchains
    Toolchain {
        #[command(subcommand)]
        command: ToolchainCommands,
    },
}

#[derive(Subcommand)]
pub enum ToolchainCommands {
    /// Update a toolchain from a feed
    Update {
        /// Feed location (path or url)
        feed: String,

        /// Toolchain directory
        #[arg(long)]
        dir: PathBuf,

        /// Only show what would be changed
        #[arg(long)]
        dry_run: bool,
    },
}

/// CLI application runner
pub struct CliApp {
    cli: Cli,
}

impl Default for CliApp {
    fn default() -> Self {
        Self::new()
    }
}

impl CliApp {
    pub fn new() -> Self {
        Self { cli: Cli::parse() }
    }

    pub fn verbose(&self) -> bool {
        self.cli.verbose
    }

    pub async fn run(self) -> Result<()> {
        if self.cli.no_color {
            colored::control::set_override(false);
        }

        match self.handle_command().await {
            Ok(_) => Ok(()),
            Err(e) => {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
                exit(1);
            }
        }
    }

    async fn handle_command(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Init {
                url,
                branch,
                group,
                all,
                fixed_ref,
            } => {
                let ctx = self.context(self.start_dir()?);
                InitCommand::new(url.clone(), branch.clone(), group.clone(), *all, fixed_ref.clone())
                    .execute(&ctx)
                    .await
            }
            Commands::Sync {
                group,
                all,
                dry_run,
                no_correct_branch,
            } => {
                let ctx = self.worktree_context()?.with_plan_only(*dry_run);
                SyncCommand::new()
                    .with_groups(group.clone())
                    .with_all(*all)
                    .with_correct_branch(!no_correct_branch)
                    .execute(ctx)
                    .await
            }
            Commands::AddGroup { group } => {
                let ctx = self.worktree_context()?;
                SyncCommand::new().adding_group(group.clone()).execute(ctx).await
            }
            Commands::RmGroup { group } => {
                let ctx = self.worktree_context()?;
                SyncCommand::new().removing_group(group.clone()).execute(ctx).await
            }
            Commands::Status { all } => {
                let ctx = self.worktree_context()?;
                StatusCommand::new(*all).execute(ctx).await
            }
            Commands::Snapshot { path } => {
                let ctx = self.worktree_context()?;
                SnapshotCommand::new(path.clone()).execute(&ctx).await
            }
            Commands::Restore { path, dry_run } => {
                let ctx = self.worktree_context()?.with_plan_only(*dry_run);
                RestoreCommand::new(path.clone()).execute(ctx).await
            }
            Commands::Deps {
                projects,
                runtime,
                test,
                toolchain,
                strict,
            } => {
                let ctx = self.worktree_context()?;
                let base = env::current_dir()?;
                DepsCommand::new(projects.clone(), *runtime, *test, toolchain.clone(), *strict)
                    .execute(&ctx, &base)
                    .await
            }
            Commands::Toolchain {
                command: ToolchainCommands::Update { feed, dir, dry_run },
            } => {
                let ctx = self.context(self.start_dir()?).with_plan_only(*dry_run);
                ToolchainUpdateCommand::new(feed.clone(), dir.clone())
                    .execute(&ctx)
                    .await
            }
        }
    }

    fn start_dir(&self) -> Result<PathBuf> {
        match &self.cli.directory {
            Some(dir) => Ok(dir.clone()),
            None => Ok(env::current_dir()?),
        }
    }

    fn context(&self, root: PathBuf) -> Context {
        let ctx = Context::new(root).with_jobs(self.cli.jobs);
        match self.cli.timeout {
            Some(secs) => ctx.with_command_timeout(Duration::from_secs(secs)),
            None => ctx,
        }
    }

    /// Context rooted at the worktree containing the start directory
    fn worktree_context(&self) -> Result<Context> {
        let start = self.start_dir()?;
        let root = Context::find_root(&start).ok_or_else(|| {
            anyhow::anyhow!(
                "Could not find a worktree in {} or its parents\nRun `wtree init` first",
                start.display()
            )
        })?;
        Ok(self.context(root))
    }
}
