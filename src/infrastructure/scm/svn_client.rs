use crate::common::error::WtreeError;
use crate::common::result::WtreeResult;
use crate::infrastructure::process::{CommandExecutor, ExecutionConfig, ProcessOutcome};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Subversion operations needed for svn packages
#[async_trait]
pub trait SvnClient: Send + Sync {
    /// Check out `url` into `dest`
    async fn checkout(&self, url: &str, dest: &Path) -> WtreeResult<()>;

    /// Update the working copy at `path`
    async fn update(&self, path: &Path) -> WtreeResult<()>;
}

/// [`SvnClient`] backed by the `svn` executable
pub struct SvnCli {
    svn_executable: String,
    timeout: Option<Duration>,
}

impl Default for SvnCli {
    fn default() -> Self {
        Self {
            svn_executable: "svn".to_string(),
            timeout: None,
        }
    }
}

impl SvnCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.svn_executable = executable.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, args: &[&str], working_dir: Option<&Path>) -> WtreeResult<()> {
        let mut config = ExecutionConfig::new().with_timeout(self.timeout);
        if let Some(dir) = working_dir {
            config = config.with_working_directory(dir);
        }
        let result = CommandExecutor::execute(&self.svn_executable, args, &config).await;
        match (result.outcome, self.timeout) {
            (ProcessOutcome::Ok, _) => Ok(()),
            (ProcessOutcome::TimedOut | ProcessOutcome::Zombie, Some(limit)) => {
                Err(WtreeError::timeout(limit.as_secs()))
            }
            _ => Err(WtreeError::command_error(
                result.combined_output(),
                CommandExecutor::display_command(&self.svn_executable, args),
                result.exit_code,
            )),
        }
    }
}

#[async_trait]
impl SvnClient for SvnCli {
    async fn checkout(&self, url: &str, dest: &Path) -> WtreeResult<()> {
        let dest = dest.to_string_lossy();
        self.run(&["checkout", url, dest.as_ref(), "--non-interactive"], None)
            .await
    }

    async fn update(&self, path: &Path) -> WtreeResult<()> {
        self.run(&["update", "--non-interactive"], Some(path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_failed_update_is_a_command_error() {
        let temp_dir = TempDir::new().unwrap();
        let svn = SvnCli::new().with_executable("false");

        let err = svn.update(temp_dir.path()).await.unwrap_err();

        assert!(matches!(err, WtreeError::CommandError { .. }));
    }

    #[tokio::test]
    async fn test_hanging_checkout_times_out() {
        let temp_dir = TempDir::new().unwrap();
        let script = temp_dir.path().join("svn");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 10\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        let svn = SvnCli::new()
            .with_executable(script.to_string_lossy())
            .with_timeout(Some(Duration::from_secs(1)));

        let err = svn
            .checkout("svn://example.com/pkg", &temp_dir.path().join("pkg"))
            .await
            .unwrap_err();

        assert!(matches!(err, WtreeError::Timeout { timeout_secs: 1 }));
        assert!(!err.is_fatal_to_run());
    }
}
