use std::path::Path;
use std::time::Duration;
use tokio::fs as async_fs;
use tracing::{debug, info};

use crate::common::error::WtreeError;
use crate::common::result::{ResultExt, WtreeResult};

const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Fetches feeds and package archives over http(s)
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http_client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> WtreeResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> WtreeResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WtreeError::config_error_with_source("Failed to create HTTP client", e))?;
        Ok(Self { http_client })
    }

    pub fn is_remote(location: &str) -> bool {
        location.starts_with("http://") || location.starts_with("https://")
    }

    pub async fn fetch_text(&self, url: &str) -> WtreeResult<String> {
        debug!("GET {}", url);
        let response = self.get(url).await?;
        response
            .text()
            .await
            .map_err(|e| WtreeError::network_error_with_source("Could not read response", Some(url.to_string()), e))
    }

    async fn get(&self, url: &str) -> WtreeResult<reqwest::Response> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| WtreeError::network_error_with_source("Request failed", Some(url.to_string()), e))?;
        if !response.status().is_success() {
            return Err(WtreeError::NetworkError {
                message: format!("HTTP {}", response.status()),
                url: Some(url.to_string()),
                source: None,
            });
        }
        Ok(response)
    }

    /// Download `url` into the file `dest`.
    pub async fn download(&self, url: &str, dest: &Path) -> WtreeResult<()> {
        info!("Downloading {}", url);
        let response = self.get(url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| WtreeError::network_error_with_source("Download interrupted", Some(url.to_string()), e))?;
        async_fs::write(dest, &bytes)
            .await
            .with_filesystem_error("Could not write download", Some(dest.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_remote() {
        assert!(HttpFetcher::is_remote("https://example.com/feed.xml"));
        assert!(HttpFetcher::is_remote("http://example.com/feed.xml"));
        assert!(!HttpFetcher::is_remote("/srv/feeds/linux64.xml"));
        assert!(!HttpFetcher::is_remote("feeds/linux64.xml"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_network_error() {
        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(2)).unwrap();
        let err = fetcher
            .fetch_text("http://127.0.0.1:9/feed.xml")
            .await
            .unwrap_err();
        match err {
            WtreeError::NetworkError { url, source, .. } => {
                assert_eq!(url.as_deref(), Some("http://127.0.0.1:9/feed.xml"));
                assert!(source.is_some());
            }
            other => panic!("Expected NetworkError, got {:?}", other),
        }
    }
}
