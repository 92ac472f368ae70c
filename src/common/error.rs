use std::path::PathBuf;
use thiserror::Error;

use crate::domain::entities::group::GroupError;
use crate::domain::services::dependency_graph::CycleError;
use crate::domain::value_objects::remote_url::RemoteUrlError;
use crate::infrastructure::xml::XmlError;

#[derive(Error, Debug)]
pub enum WtreeError {
    /// Duplicate src/project, dangling references, conflicting attributes.
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        file_path: Option<PathBuf>,
    },

    #[error("Group error: {0}")]
    GroupError(#[from] GroupError),

    #[error("{0}")]
    CycleError(#[from] CycleError),

    #[error("Remote url error: {0}")]
    RemoteUrlError(#[from] RemoteUrlError),

    /// Unresolvable credentials, unreachable feed, missing worktree config.
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Repository operation failed: {message}")]
    RepositoryError {
        message: String,
        src: Option<String>,
    },

    #[error("File system operation failed: {message}")]
    FileSystemError {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Command execution failed: {message}")]
    CommandError {
        message: String,
        command: String,
        exit_code: Option<i32>,
    },

    #[error("Network operation failed: {message}")]
    NetworkError {
        message: String,
        url: Option<String>,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("XML error: {message}")]
    XmlError {
        message: String,
        file_path: Option<PathBuf>,
    },

    #[error("Serialization error: {message}")]
    SerializationError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Operation timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl WtreeError {
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            file_path: None,
        }
    }

    pub fn validation_error_in_file(message: impl Into<String>, file_path: PathBuf) -> Self {
        Self::ValidationError {
            message: message.into(),
            file_path: Some(file_path),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_error_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConfigError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn repository_error(message: impl Into<String>, src: Option<String>) -> Self {
        Self::RepositoryError {
            message: message.into(),
            src,
        }
    }

    pub fn filesystem_error(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::FileSystemError {
            message: message.into(),
            path,
            source: None,
        }
    }

    pub fn filesystem_error_with_source(
        message: impl Into<String>,
        path: Option<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystemError {
            message: message.into(),
            path,
            source: Some(source),
        }
    }

    pub fn command_error(
        message: impl Into<String>,
        command: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::CommandError {
            message: message.into(),
            command: command.into(),
            exit_code,
        }
    }

    pub fn network_error_with_source(
        message: impl Into<String>,
        url: Option<String>,
        source: reqwest::Error,
    ) -> Self {
        Self::NetworkError {
            message: message.into(),
            url,
            source: Some(source),
        }
    }

    pub fn xml_error(message: impl Into<String>, file_path: Option<PathBuf>) -> Self {
        Self::XmlError {
            message: message.into(),
            file_path,
        }
    }

    pub fn serialization_error_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn timeout(timeout_secs: u64) -> Self {
        Self::Timeout { timeout_secs }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Errors that make any partial reconciliation unsafe.
    pub fn is_fatal_to_run(&self) -> bool {
        !matches!(
            self,
            Self::RepositoryError { .. } | Self::CommandError { .. } | Self::Timeout { .. }
        )
    }
}

impl From<std::io::Error> for WtreeError {
    fn from(error: std::io::Error) -> Self {
        Self::filesystem_error_with_source("File system operation failed", None, error)
    }
}

impl From<serde_yaml::Error> for WtreeError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::serialization_error_with_source("YAML serialization failed", error)
    }
}

impl From<serde_json::Error> for WtreeError {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization_error_with_source("JSON serialization failed", error)
    }
}

impl From<XmlError> for WtreeError {
    fn from(error: XmlError) -> Self {
        Self::xml_error(error.to_string(), None)
    }
}

impl From<reqwest::Error> for WtreeError {
    fn from(error: reqwest::Error) -> Self {
        let url = error.url().map(|u| u.to_string());
        Self::network_error_with_source("Network request failed", url, error)
    }
}
