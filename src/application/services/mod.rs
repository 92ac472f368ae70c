pub mod branch_syncer;
pub mod deps_solver;
pub mod group_resolver;
pub mod worker_pool;
pub mod worktree_reconciler;

pub use branch_syncer::{BranchSyncer, SyncOutcome, SyncStatus};
pub use deps_solver::{DepsSolver, SolveResult};
pub use group_resolver::GroupResolver;
pub use worker_pool::WorkerPool;
pub use worktree_reconciler::{RepoAction, RepoResult, WorktreeReconciler};
