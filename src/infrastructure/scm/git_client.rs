use crate::common::error::WtreeError;
use crate::common::result::WtreeResult;
use crate::domain::entities::repository::{Branch, HasRemotes, RepoSpec};
use crate::infrastructure::process::{CommandExecutor, ExecutionConfig, ProcessOutcome};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Output of one git invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOutput {
    pub outcome: ProcessOutcome,
    /// stdout and stderr, trimmed
    pub output: String,
}

impl GitOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            outcome: ProcessOutcome::Ok,
            output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            outcome: ProcessOutcome::Failed,
            output: output.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome == ProcessOutcome::Ok
    }
}

/// Runs git in a given directory
///
/// Implementations never fail: a git process that could not run or timed
/// out is reported through [`GitOutput::outcome`].
#[async_trait]
pub trait GitClient: Send + Sync {
    async fn call(&self, working_dir: &Path, args: &[&str]) -> GitOutput;
}

/// [`GitClient`] backed by the `git` executable
pub struct GitCli {
    git_executable: String,
    timeout: Option<Duration>,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            git_executable: "git".to_string(),
            timeout: None,
        }
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.git_executable = executable.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl GitClient for GitCli {
    async fn call(&self, working_dir: &Path, args: &[&str]) -> GitOutput {
        let config = ExecutionConfig::new()
            .with_working_directory(working_dir)
            .with_environment_variable("LC_ALL", "C")
            .with_timeout(self.timeout);
        let result = CommandExecutor::execute(&self.git_executable, args, &config).await;
        let output = match result.outcome {
            ProcessOutcome::TimedOut | ProcessOutcome::Zombie => {
                format!("git {} {}", args.join(" "), result.outcome)
            }
            _ => result.combined_output(),
        };
        GitOutput {
            outcome: result.outcome,
            output,
        }
    }
}

/// Git commands on one repository
pub struct Git<'a> {
    client: &'a dyn GitClient,
    pub repo: PathBuf,
}

impl<'a> Git<'a> {
    pub fn new(client: &'a dyn GitClient, repo: impl Into<PathBuf>) -> Self {
        Self {
            client,
            repo: repo.into(),
        }
    }

    pub async fn call(&self, args: &[&str]) -> GitOutput {
        debug!("git {} (in {})", args.join(" "), self.repo.display());
        self.client.call(&self.repo, args).await
    }

    /// Run git and return its output, or an error naming the command.
    pub async fn call_checked(&self, args: &[&str]) -> WtreeResult<String> {
        let result = self.call(args).await;
        if result.is_ok() {
            Ok(result.output)
        } else {
            Err(WtreeError::command_error(
                result.output,
                format!("git {}", args.join(" ")),
                None,
            ))
        }
    }

    /// Current branch name, None on a detached HEAD.
    pub async fn current_branch(&self) -> Option<String> {
        let result = self.call(&["symbolic-ref", "HEAD"]).await;
        if !result.is_ok() {
            return None;
        }
        let line = result.output.lines().next()?;
        Some(line.strip_prefix("refs/heads/").unwrap_or(line).to_string())
    }

    /// True when there are no staged or unstaged changes to tracked files.
    ///
    /// A failing `git status` counts as dirty.
    pub async fn is_clean(&self) -> bool {
        let result = self
            .call(&["status", "--porcelain", "--untracked-files=no"])
            .await;
        result.is_ok() && result.output.lines().all(|l| l.trim().is_empty())
    }

    pub async fn is_empty(&self) -> bool {
        !self.call(&["rev-parse", "--verify", "HEAD"]).await.is_ok()
    }

    pub async fn get_config(&self, name: &str) -> Option<String> {
        let result = self.call(&["config", "--get", name]).await;
        if result.is_ok() && !result.output.is_empty() {
            Some(result.output)
        } else {
            None
        }
    }

    pub async fn set_config(&self, name: &str, value: &str) -> WtreeResult<()> {
        self.call_checked(&["config", name, value]).await.map(|_| ())
    }

    /// sha1 of a full ref, None if it does not exist.
    pub async fn get_ref_sha1(&self, full_ref: &str) -> Option<String> {
        let result = self
            .call(&["show-ref", "--verify", "--hash", full_ref])
            .await;
        if result.is_ok() {
            result.output.lines().next().map(|l| l.trim().to_string())
        } else {
            None
        }
    }

    pub async fn head_sha1(&self) -> WtreeResult<String> {
        let out = self.call_checked(&["rev-parse", "HEAD"]).await?;
        Ok(out.trim().to_string())
    }

    /// Commits (ahead, behind) of HEAD relative to `remote_ref`.
    pub async fn ahead_behind(&self, remote_ref: &str) -> Option<(usize, usize)> {
        let range = format!("HEAD...{}", remote_ref);
        let result = self
            .call(&["rev-list", "--left-right", "--count", &range])
            .await;
        if !result.is_ok() {
            return None;
        }
        let mut counts = result.output.split_whitespace().map(str::parse::<usize>);
        match (counts.next(), counts.next()) {
            (Some(Ok(ahead)), Some(Ok(behind))) => Some((ahead, behind)),
            _ => None,
        }
    }

    /// Resolve `rev` to a sha1.
    pub async fn rev_parse(&self, rev: &str) -> Option<String> {
        let result = self.call(&["rev-parse", "--verify", "--quiet", rev]).await;
        if result.is_ok() {
            result.output.lines().next().map(|l| l.trim().to_string())
        } else {
            None
        }
    }

    /// Add the remote, or point it to a new url.
    pub async fn set_remote(&self, name: &str, url: &str) -> WtreeResult<()> {
        let key = format!("remote.{}.url", name);
        if self.get_config(&key).await.as_deref() == Some(url) {
            return Ok(());
        }
        self.call(&["remote", "rm", name]).await;
        self.call_checked(&["remote", "add", name, url]).await?;
        Ok(())
    }

    /// `remote/branch` tracked by `branch`, if configured.
    pub async fn get_tracking_branch(&self, branch: &str) -> Option<String> {
        let remote = self.get_config(&format!("branch.{}.remote", branch)).await?;
        let merge = self.get_config(&format!("branch.{}.merge", branch)).await?;
        let merge = merge.strip_prefix("refs/heads/").unwrap_or(&merge);
        Some(format!("{}/{}", remote, merge))
    }

    /// Make `branch` track its remote branch, creating it if needed.
    ///
    /// Does nothing on a repository without commits.
    pub async fn set_tracking_branch(&self, branch: &Branch) -> WtreeResult<()> {
        let Some(expected) = branch.remote_ref() else {
            return Ok(());
        };
        if self.get_tracking_branch(&branch.name).await.as_deref() == Some(expected.as_str()) {
            return Ok(());
        }
        if self.is_empty().await {
            return Ok(());
        }
        let local_ref = format!("refs/heads/{}", branch.name);
        if self.get_ref_sha1(&local_ref).await.is_none() {
            self.call_checked(&["branch", &branch.name]).await?;
        }
        let remote = branch.tracks.as_deref().unwrap_or("origin");
        self.set_config(&format!("branch.{}.remote", branch.name), remote)
            .await?;
        self.set_config(
            &format!("branch.{}.merge", branch.name),
            &format!("refs/heads/{}", branch.remote_branch_name()),
        )
        .await
    }

    /// Clone `repo` into this repository's path.
    ///
    /// Runs from the parent directory, which must exist.
    pub async fn clone_repo(&self, repo: &RepoSpec) -> WtreeResult<()> {
        let remote = repo.default_remote().ok_or_else(|| {
            WtreeError::repository_error("No remote to clone from", Some(repo.src.clone()))
        })?;
        let parent = self.repo.parent().unwrap_or_else(|| Path::new("."));
        let dest = self.repo.to_string_lossy().into_owned();
        let mut args = vec![
            "clone",
            remote.url.as_str(),
            dest.as_str(),
            "-o",
            remote.name.as_str(),
        ];
        if let Some(branch) = &repo.default_branch {
            args.push("-b");
            args.push(branch.as_str());
        }
        let result = self.client.call(parent, &args).await;
        if !result.is_ok() {
            return Err(WtreeError::repository_error(
                format!("Cloning {} failed\n{}", remote.url, result.output),
                Some(repo.src.clone()),
            ));
        }
        if let Some(fixed_ref) = &repo.fixed_ref {
            self.call_checked(&["reset", "--hard", fixed_ref]).await?;
        }
        Ok(())
    }

    /// Set remotes and the tracking branch from the manifest definition.
    pub async fn apply_repo_config(&self, repo: &RepoSpec) -> WtreeResult<()> {
        for remote in &repo.remotes {
            self.set_remote(&remote.name, &remote.url).await?;
        }
        if let Some(branch) = repo.tracking_branch() {
            self.set_tracking_branch(&branch).await?;
        }
        Ok(())
    }
}
