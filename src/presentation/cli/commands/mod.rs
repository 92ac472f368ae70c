pub mod deps;
pub mod init;
pub mod snapshot;
pub mod status;
pub mod sync;
pub mod toolchain;

pub use deps::*;
pub use init::*;
pub use snapshot::*;
pub use status::*;
pub use sync::*;
pub use toolchain::*;

use colored::Colorize;
use std::sync::Arc;

use crate::application::services::{SyncOutcome, SyncStatus};
use crate::common::context::Context;
use crate::infrastructure::scm::{GitCli, GitClient};

/// git client honoring the context timeout
pub(crate) fn git_client(ctx: &Context) -> Arc<dyn GitClient> {
    Arc::new(GitCli::new().with_timeout(ctx.command_timeout))
}

/// One line per repository worth reporting, with the message indented below it
pub(crate) fn print_outcomes(outcomes: &[SyncOutcome]) {
    for outcome in outcomes {
        let prefix = match outcome.status {
            SyncStatus::Ok => "*".green().bold(),
            SyncStatus::Skipped => "*".yellow().bold(),
            SyncStatus::Failed => "*".red().bold(),
        };
        if outcome.status == SyncStatus::Ok && outcome.message.is_empty() {
            continue;
        }
        println!("{} {} ({})", prefix, outcome.src.bold(), outcome.status);
        for line in outcome.message.lines().filter(|l| !l.is_empty()) {
            println!("    {}", line);
        }
    }
}
