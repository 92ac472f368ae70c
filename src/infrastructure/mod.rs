/// Infrastructure layer modules
///
/// This layer provides concrete implementations for external system interactions:
/// - git and svn through their executables
/// - manifest, cache, feed and toolchain files
/// - process execution with timeouts
/// - http downloads of feeds and archives
pub mod filesystem;
pub mod network;
pub mod process;
pub mod scm;
pub mod xml;

// Re-export commonly used types
pub use filesystem::{ConfigStore, GitCacheStore, ManifestStore, SnapshotStore, ToolchainStore};
pub use network::HttpFetcher;
pub use process::CommandExecutor;
pub use scm::{Git, GitCli, GitClient, GitOutput, SvnCli, SvnClient};
