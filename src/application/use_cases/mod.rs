pub mod init_worktree;
pub mod resolve_deps;
pub mod snapshot_worktree;
pub mod sync_worktree;
pub mod update_toolchain;
pub mod worktree_status;

pub use init_worktree::{InitWorktreeConfig, InitWorktreeUseCase};
pub use resolve_deps::{ResolveDepsConfig, ResolveDepsReport, ResolveDepsUseCase};
pub use snapshot_worktree::{GenerateSnapshotUseCase, RestoreSnapshotUseCase};
pub use sync_worktree::{GroupChange, SyncReport, SyncWorktreeConfig, SyncWorktreeUseCase};
pub use update_toolchain::{UpdateToolchainConfig, UpdateToolchainReport, UpdateToolchainUseCase};
pub use worktree_status::{WorktreeStatus, WorktreeStatusUseCase};
