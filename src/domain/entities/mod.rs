pub mod group;
pub mod manifest;
pub mod package;
pub mod repository;
pub mod snapshot;
pub mod worktree;
