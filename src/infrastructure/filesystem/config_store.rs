use std::path::Path;
use tokio::fs as async_fs;
use tracing::debug;

use crate::common::error::WtreeError;
use crate::common::result::WtreeResult;
use crate::domain::entities::worktree::WorktreeConfig;

/// Reads and writes the worktree configuration (`.qi/config.yml`)
#[derive(Debug, Default)]
pub struct ConfigStore;

impl ConfigStore {
    pub fn new() -> Self {
        Self
    }

    pub async fn load<P: AsRef<Path>>(&self, path: P) -> WtreeResult<WorktreeConfig> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(WtreeError::config_error(format!(
                "No worktree configuration at {}. Run `wtree init` first",
                path.display()
            )));
        }
        let content = async_fs::read_to_string(path).await.map_err(|e| {
            WtreeError::filesystem_error_with_source(
                "Could not read worktree configuration",
                Some(path.to_path_buf()),
                e,
            )
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            WtreeError::config_error_with_source(
                format!("Invalid worktree configuration in {}", path.display()),
                e,
            )
        })
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P, config: &WorktreeConfig) -> WtreeResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent).await.map_err(|e| {
                WtreeError::filesystem_error_with_source(
                    "Could not create metadata directory",
                    Some(parent.to_path_buf()),
                    e,
                )
            })?;
        }
        let content = serde_yaml::to_string(config)?;
        async_fs::write(path, content).await.map_err(|e| {
            WtreeError::filesystem_error_with_source(
                "Could not write worktree configuration",
                Some(path.to_path_buf()),
                e,
            )
        })?;
        debug!("Saved worktree configuration to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".qi").join("config.yml");
        let mut config = WorktreeConfig::new("git@srv:manifest.git")
            .with_groups(vec!["extra".to_string(), "default".to_string()]);
        config
            .usernames
            .insert("gerrit.example.com".to_string(), "jdoe".to_string());

        let store = ConfigStore::new();
        store.save(&path, &config).await.unwrap();
        let loaded = store.load(&path).await.unwrap();

        assert_eq!(loaded, config);
        assert_eq!(loaded.configured_groups(), ["default", "extra"]);
    }

    #[tokio::test]
    async fn test_defaults_when_fields_are_missing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yml");
        async_fs::write(&path, "url: git@srv:manifest.git\n").await.unwrap();

        let config = ConfigStore::new().load(&path).await.unwrap();

        assert_eq!(config.branch, "master");
        assert!(config.review);
        assert!(!config.all_repos);
        assert!(!config.has_groups());
    }

    #[tokio::test]
    async fn test_missing_config_is_a_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = ConfigStore::new()
            .load(temp_dir.path().join("config.yml"))
            .await
            .unwrap_err();
        assert!(matches!(err, WtreeError::ConfigError { .. }));
    }
}
