//! # wtree - multi-repository worktree manager
//!
//! `wtree` keeps a local collection of git repositories (a *worktree*) in sync
//! with a declarative XML manifest, and resolves the build order of
//! interdependent build projects and prebuilt toolchain packages.
//!
//! ## Quick Start
//!
//! 1. Point a new worktree at a manifest repository:
//!
//! ```bash
//! wtree init git@example.com:manifest.git --group default
//! ```
//!
//! 2. Synchronize it whenever the manifest or the remotes change:
//!
//! ```bash
//! wtree sync -j 4
//! ```
//!
//! 3. Add or remove groups of repositories:
//!
//! ```bash
//! wtree add-group extra
//! wtree rm-group default
//! ```
//!
//! ## Architecture
//!
//! - [`domain`]: manifest model, dependency graph and worktree diff
//! - [`application`]: group resolution, reconciliation, branch sync, use cases
//! - [`infrastructure`]: git/svn processes, XML/YAML/JSON stores, http downloads
//! - [`presentation`]: the command line interface
//! - [`common`]: invocation context and error handling
//!
//! ## Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wtree::application::use_cases::sync_worktree::{SyncWorktreeConfig, SyncWorktreeUseCase};
//! use wtree::common::Context;
//! use wtree::infrastructure::GitCli;
//!
//! # async fn example() -> wtree::Result<()> {
//! let ctx = Context::new("/path/to/worktree").with_jobs(4);
//! let config = SyncWorktreeConfig::default().with_correct_branch(false);
//! let report = SyncWorktreeUseCase::new(ctx, Arc::new(GitCli::new()), config)
//!     .execute()
//!     .await?;
//!
//! for error in report.errors() {
//!     eprintln!("{}", error);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(rustdoc::broken_intra_doc_links)]

pub mod application;
pub mod common;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// Re-export commonly used types for convenience
pub use crate::common::error::WtreeError;
pub use crate::common::result::WtreeResult as Result;
