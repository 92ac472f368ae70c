pub mod config_store;
pub mod feed_store;
pub mod git_cache_store;
pub mod manifest_store;
pub mod package_installer;
pub mod project_store;
pub mod snapshot_store;
pub mod toolchain_store;

pub use config_store::ConfigStore;
pub use feed_store::FeedStore;
pub use git_cache_store::GitCacheStore;
pub use manifest_store::ManifestStore;
pub use package_installer::{DefaultPackageInstaller, PackageInstaller};
pub use project_store::ProjectStore;
pub use snapshot_store::SnapshotStore;
pub use toolchain_store::ToolchainStore;
