pub mod git_client;
pub mod svn_client;

pub use git_client::{Git, GitCli, GitClient, GitOutput};
pub use svn_client::{SvnCli, SvnClient};
