use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use thiserror::Error;
use url::Url;

/// リモートURL関連のエラー
#[derive(Debug, Error, PartialEq)]
pub enum RemoteUrlError {
    #[error("Empty remote url")]
    Empty,

    #[error("Unrecognized remote url: {0}")]
    Unrecognized(String),

    #[error("Could not find a username for {server} (needed by {url})")]
    MissingUsername { server: String, url: String },
}

/// リモートURLのプロトコル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// file:// URL
    File,
    /// ssh://、またはscp形式
    Ssh,
    /// 既存のローカルパス
    Local,
    /// git://
    Git,
    /// http://
    Http,
    /// https://
    Https,
}

/// ホスト名からユーザー名を解決する外部コラボレーター
pub trait UsernameLookup: Send + Sync {
    /// ユーザー名が見つからない場合はNone
    fn lookup_username(&self, server: &str) -> Option<String>;
}

/// 設定値によるユーザー名の解決
#[derive(Debug, Clone, Default)]
pub struct StaticUsernames {
    usernames: HashMap<String, String>,
}

impl StaticUsernames {
    pub fn new(usernames: HashMap<String, String>) -> Self {
        Self { usernames }
    }
}

impl UsernameLookup for StaticUsernames {
    fn lookup_username(&self, server: &str) -> Option<String> {
        self.usernames.get(server).cloned()
    }
}

/// 解決結果をホストごとにキャッシュするラッパー
pub struct CachedUsernameLookup<L> {
    inner: L,
    cache: Mutex<HashMap<String, String>>,
}

impl<L: UsernameLookup> CachedUsernameLookup<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl<L: UsernameLookup> UsernameLookup for CachedUsernameLookup<L> {
    fn lookup_username(&self, server: &str) -> Option<String> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(username) = cache.get(server) {
                return Some(username.clone());
            }
        }
        let username = self.inner.lookup_username(server)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(server.to_string(), username.clone());
        }
        Some(username)
    }
}

/// 分類済みのリモートURLの値オブジェクト
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUrl {
    /// 元のURL
    pub url: String,
    /// プロジェクト名を連結するプレフィックス
    pub prefix: String,
    /// プロトコル
    pub protocol: Protocol,
    /// サーバー名
    pub server: Option<String>,
    /// ポート番号
    pub port: Option<u16>,
    /// ユーザー名
    pub username: Option<String>,
}

fn ssh_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^ssh://(?:(?P<user>[^@/]+)@)?(?P<server>[^:/@]+)(?::(?P<port>\d+))?(?P<path>/.*)?$",
        )
        .expect("valid ssh regex")
    })
}

fn scp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<user>[^@/:]+)@(?P<server>[^:/]+):(?P<path>.*)$").expect("valid scp regex")
    })
}

impl RemoteUrl {
    /// URLを分類する
    ///
    /// 判定順序: file://、ssh://、scp形式、既存のローカルパス、scheme://host[:port]
    pub fn parse(url: &str, usernames: &dyn UsernameLookup) -> Result<Self, RemoteUrlError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(RemoteUrlError::Empty);
        }

        if url.starts_with("file://") {
            return Ok(Self::bare(url, Protocol::File));
        }

        if let Some(caps) = ssh_regex().captures(url) {
            let server = caps["server"].to_string();
            let port = caps.name("port").and_then(|p| p.as_str().parse::<u16>().ok());
            let path = caps.name("path").map(|p| p.as_str()).unwrap_or("");
            let username = match caps.name("user") {
                Some(user) => user.as_str().to_string(),
                None => usernames.lookup_username(&server).ok_or_else(|| {
                    RemoteUrlError::MissingUsername {
                        server: server.clone(),
                        url: url.to_string(),
                    }
                })?,
            };
            let mut prefix = format!("ssh://{}@{}", username, server);
            if let Some(port) = port {
                prefix.push_str(&format!(":{}", port));
            }
            prefix.push_str(path);
            return Ok(Self {
                url: url.to_string(),
                prefix: with_separator(prefix),
                protocol: Protocol::Ssh,
                server: Some(server),
                port,
                username: Some(username),
            });
        }

        if let Some(caps) = scp_regex().captures(url) {
            return Ok(Self {
                url: url.to_string(),
                prefix: with_separator(url.to_string()),
                protocol: Protocol::Ssh,
                server: Some(caps["server"].to_string()),
                port: None,
                username: Some(caps["user"].to_string()),
            });
        }

        if Path::new(url).exists() {
            return Ok(Self::bare(url, Protocol::Local));
        }

        let parsed = Url::parse(url).map_err(|_| RemoteUrlError::Unrecognized(url.to_string()))?;
        let protocol = match parsed.scheme() {
            "git" => Protocol::Git,
            "http" => Protocol::Http,
            "https" => Protocol::Https,
            _ => return Err(RemoteUrlError::Unrecognized(url.to_string())),
        };
        let server = parsed
            .host_str()
            .ok_or_else(|| RemoteUrlError::Unrecognized(url.to_string()))?;
        Ok(Self {
            url: url.to_string(),
            prefix: with_separator(url.to_string()),
            protocol,
            server: Some(server.to_string()),
            port: parsed.port(),
            username: None,
        })
    }

    fn bare(url: &str, protocol: Protocol) -> Self {
        Self {
            url: url.to_string(),
            prefix: with_separator(url.to_string()),
            protocol,
            server: None,
            port: None,
            username: None,
        }
    }
}

impl fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

fn with_separator(mut prefix: String) -> String {
    if !prefix.ends_with('/') && !prefix.ends_with(':') {
        prefix.push('/');
    }
    prefix
}

/// URLからプロジェクト名を取り出す
///
/// ```
/// use wtree::domain::value_objects::remote_url::name_from_url;
///
/// assert_eq!(name_from_url("git@git:foo/bar.git"), "foo/bar.git");
/// assert_eq!(name_from_url("ssh://git@example.com:2222/foo/bar.git"), "foo/bar.git");
/// assert_eq!(name_from_url("file:///srv/git/bar.git"), "bar.git");
/// ```
pub fn name_from_url(url: &str) -> String {
    if url.starts_with("file://") {
        return url.rsplit('/').next().unwrap_or(url).to_string();
    }
    if let Some((_, rest)) = url.split_once("://") {
        let rest = match rest.rsplit_once(':') {
            Some((_, port_and_rest)) => port_and_rest,
            None => rest,
        };
        return match rest.split_once('/') {
            Some((_, path)) => path.to_string(),
            None => rest.to_string(),
        };
    }
    match url.rsplit_once(':') {
        Some((_, path)) => path.to_string(),
        None => url.rsplit('/').next().unwrap_or(url).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingLookup {
        calls: Arc<AtomicUsize>,
        answer: Option<String>,
    }

    impl UsernameLookup for CountingLookup {
        fn lookup_username(&self, _server: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone()
        }
    }

    #[test]
    fn test_parse_file_url() {
        let remote = RemoteUrl::parse("file:///srv/git", &StaticUsernames::default()).unwrap();
        assert_eq!(remote.protocol, Protocol::File);
        assert_eq!(remote.prefix, "file:///srv/git/");
    }

    #[test]
    fn test_parse_ssh_url_with_port() {
        let remote =
            RemoteUrl::parse("ssh://john@gerrit:29418", &StaticUsernames::default()).unwrap();
        assert_eq!(remote.protocol, Protocol::Ssh);
        assert_eq!(remote.server.as_deref(), Some("gerrit"));
        assert_eq!(remote.port, Some(29418));
        assert_eq!(remote.username.as_deref(), Some("john"));
        assert_eq!(remote.prefix, "ssh://john@gerrit:29418/");
    }

    #[test]
    fn test_parse_ssh_url_without_username_uses_lookup_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lookup = CachedUsernameLookup::new(CountingLookup {
            calls: calls.clone(),
            answer: Some("jdoe".to_string()),
        });

        let first = RemoteUrl::parse("ssh://gerrit:29418/", &lookup).unwrap();
        let second = RemoteUrl::parse("ssh://gerrit:29418/", &lookup).unwrap();

        assert_eq!(first.prefix, "ssh://jdoe@gerrit:29418/");
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parse_ssh_url_username_not_found() {
        let result = RemoteUrl::parse("ssh://gerrit", &StaticUsernames::default());
        assert_eq!(
            result,
            Err(RemoteUrlError::MissingUsername {
                server: "gerrit".to_string(),
                url: "ssh://gerrit".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_scp_url() {
        let remote = RemoteUrl::parse("git@github.com:aldebaran", &StaticUsernames::default())
            .unwrap();
        assert_eq!(remote.protocol, Protocol::Ssh);
        assert_eq!(remote.server.as_deref(), Some("github.com"));
        assert_eq!(remote.prefix, "git@github.com:aldebaran/");
    }

    #[test]
    fn test_parse_local_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().to_string_lossy().to_string();
        let remote = RemoteUrl::parse(&path, &StaticUsernames::default()).unwrap();
        assert_eq!(remote.protocol, Protocol::Local);
        assert_eq!(remote.prefix, format!("{}/", path));
    }

    #[test]
    fn test_parse_scheme_urls() {
        let git = RemoteUrl::parse("git://example.com", &StaticUsernames::default()).unwrap();
        assert_eq!(git.protocol, Protocol::Git);
        assert_eq!(git.prefix, "git://example.com/");

        let https =
            RemoteUrl::parse("https://example.com:8443/git/", &StaticUsernames::default())
                .unwrap();
        assert_eq!(https.protocol, Protocol::Https);
        assert_eq!(https.port, Some(8443));
        assert_eq!(https.prefix, "https://example.com:8443/git/");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            RemoteUrl::parse("not a url at all", &StaticUsernames::default()),
            Err(RemoteUrlError::Unrecognized(_))
        ));
        assert_eq!(
            RemoteUrl::parse("  ", &StaticUsernames::default()),
            Err(RemoteUrlError::Empty)
        );
    }

    #[test]
    fn test_name_from_url() {
        assert_eq!(name_from_url("git://example.com/foo/bar.git"), "foo/bar.git");
        assert_eq!(name_from_url("bar.git"), "bar.git");
    }
}
