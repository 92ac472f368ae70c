use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tracing::{debug, info};
use xot::Node;

use super::project_store::read_depends;
use crate::common::error::WtreeError;
use crate::common::result::WtreeResult;
use crate::domain::entities::package::{Package, PackageSource};
use crate::infrastructure::network::HttpFetcher;
use crate::infrastructure::xml::XmlDocument;

/// Reads toolchain feeds, following `<feed>` includes
pub struct FeedStore {
    fetcher: HttpFetcher,
}

impl FeedStore {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }

    /// All packages reachable from `location`.
    ///
    /// A package declared again by a later feed replaces the earlier one.
    /// Each feed is read at most once.
    pub async fn read_feed(&self, location: &str) -> WtreeResult<Vec<Package>> {
        let mut packages: Vec<Package> = Vec::new();
        let mut visited = HashSet::new();
        let mut pending = VecDeque::from([location.to_string()]);

        while let Some(feed) = pending.pop_front() {
            if !visited.insert(feed.clone()) {
                continue;
            }
            info!("Reading feed {}", feed);
            let content = self.load(&feed).await?;
            let (feed_packages, includes) = parse_feed(&feed, &content)?;
            for package in feed_packages {
                match packages.iter_mut().find(|p| p.name == package.name) {
                    Some(existing) => *existing = package,
                    None => packages.push(package),
                }
            }
            pending.extend(includes);
        }
        Ok(packages)
    }

    async fn load(&self, feed: &str) -> WtreeResult<String> {
        let result = if HttpFetcher::is_remote(feed) {
            self.fetcher.fetch_text(feed).await
        } else {
            async_fs::read_to_string(feed).await.map_err(WtreeError::from)
        };
        result.map_err(|e| {
            WtreeError::config_error_with_source(
                format!("Could not parse {}\nError was: \n{}", feed, e),
                e,
            )
        })
    }
}

/// Packages declared by one feed, and the feeds it includes.
pub fn parse_feed(feed: &str, content: &str) -> WtreeResult<(Vec<Package>, Vec<String>)> {
    let doc = XmlDocument::parse_with_root(content, "toolchain").map_err(|e| {
        WtreeError::xml_error(format!("Could not parse {}: {}", feed, e), None)
    })?;
    let root = doc.root();

    let mut packages = Vec::new();
    for node in doc.children_named(root, "package") {
        packages.push(parse_package(&doc, node, feed, false)?);
    }
    for node in doc.children_named(root, "svn_package") {
        packages.push(parse_package(&doc, node, feed, true)?);
    }

    let mut includes = Vec::new();
    for node in doc.children_named(root, "feed") {
        if let Some(url) = doc.attribute(node, "url") {
            includes.push(resolve(feed, url));
        } else if let Some(name) = doc.attribute(node, "name") {
            includes.push(resolve(feed, &format!("{}.xml", name)));
        }
    }
    debug!("{}: {} packages, {} includes", feed, packages.len(), includes.len());
    Ok((packages, includes))
}

fn parse_package(doc: &XmlDocument, node: Node, feed: &str, svn: bool) -> WtreeResult<Package> {
    let name = doc.string_attribute(node, "name").ok_or_else(|| {
        WtreeError::validation_error(format!(
            "Error when parsing feed: '{}'\nMissing 'name' attribute",
            feed
        ))
    })?;
    let url = doc.string_attribute(node, "url");
    let directory = doc.string_attribute(node, "directory");
    let svn_url = doc.string_attribute(node, "svn_url");
    if url.is_some() && directory.is_some() {
        return Err(WtreeError::validation_error(format!(
            "Bad configuration for package {}. 'directory' and 'url' are mutually exclusive",
            name
        )));
    }

    let source = match (svn, svn_url, url, &directory) {
        (true, _, Some(url), _) | (_, Some(url), _, _) => PackageSource::Svn { url },
        (_, _, Some(url), _) => PackageSource::Archive { url },
        (_, _, _, Some(directory)) => PackageSource::LocalDir {
            path: PathBuf::from(resolve(feed, directory)),
        },
        _ => PackageSource::ToolchainFile,
    };

    let mut package = Package::new(name, source).with_dependencies(read_depends(doc, node)?);
    package.version = doc.string_attribute(node, "version");
    package.sysroot = doc.string_attribute(node, "sysroot");
    package.toolchain_file = doc.string_attribute(node, "toolchain_file").map(|file| {
        if directory.is_some() {
            resolve(feed, &file)
        } else {
            file
        }
    });
    Ok(package)
}

/// Resolve `location` against the directory of `feed`.
fn resolve(feed: &str, location: &str) -> String {
    if HttpFetcher::is_remote(location) || Path::new(location).is_absolute() {
        return location.to_string();
    }
    if HttpFetcher::is_remote(feed) {
        return match url::Url::parse(feed).and_then(|base| base.join(location)) {
            Ok(joined) => joined.to_string(),
            Err(_) => location.to_string(),
        };
    }
    let root = Path::new(feed).parent().unwrap_or_else(|| Path::new(""));
    root.join(location).to_string_lossy().into_owned()
}
