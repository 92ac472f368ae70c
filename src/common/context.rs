//! Per-invocation context shared by the core components.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the hidden directory holding worktree metadata.
pub const WORKTREE_DIR: &str = ".qi";

/// Explicit invocation context. Created once by the caller and passed down.
#[derive(Debug, Clone)]
pub struct Context {
    /// Root of the worktree
    pub worktree_root: PathBuf,
    /// Size of the worker pool; 1 means sequential
    pub jobs: usize,
    /// Compute plans without touching the disk
    pub plan_only: bool,
    /// Timeout applied to each external process
    pub command_timeout: Option<Duration>,
}

impl Context {
    pub fn new(worktree_root: impl Into<PathBuf>) -> Self {
        Self {
            worktree_root: worktree_root.into(),
            jobs: 1,
            plan_only: false,
            command_timeout: None,
        }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_plan_only(mut self, plan_only: bool) -> Self {
        self.plan_only = plan_only;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Closest ancestor of `start` (itself included) holding a worktree.
    pub fn find_root(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| dir.join(WORKTREE_DIR).join("config.yml").is_file())
            .map(Path::to_path_buf)
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.worktree_root.join(WORKTREE_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.metadata_dir().join("config.yml")
    }

    pub fn git_cache_path(&self) -> PathBuf {
        self.metadata_dir().join("git.xml")
    }

    /// Clone of the manifest repository.
    pub fn manifest_repo_path(&self) -> PathBuf {
        self.metadata_dir().join("manifests").join("default")
    }

    pub fn repo_path(&self, src: &str) -> PathBuf {
        self.worktree_root.join(src)
    }

    /// Worktree-relative src of `path`, if it lies inside the worktree.
    pub fn src_of(&self, path: &Path) -> Option<String> {
        let relative = pathdiff::diff_paths(path, &self.worktree_root)?;
        if relative.starts_with("..") {
            return None;
        }
        Some(
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/"),
        )
    }
}
