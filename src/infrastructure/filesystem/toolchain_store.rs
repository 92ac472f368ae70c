use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tracing::debug;
use xot::Node;

use super::manifest_store::{attach_file, required};
use super::project_store::{read_depends, write_depends};
use crate::common::error::WtreeError;
use crate::common::result::WtreeResult;
use crate::domain::entities::package::{DepPhase, Package, PackageSource};
use crate::infrastructure::xml::{XmlDocument, XmlElement};

/// Name of the toolchain database inside a toolchain directory
pub const TOOLCHAIN_DB_FILE: &str = "toolchain.xml";

/// Metadata file a materialized package may carry
pub const PACKAGE_FILE: &str = "package.xml";

/// Reads and writes the toolchain database
#[derive(Debug, Default)]
pub struct ToolchainStore;

impl ToolchainStore {
    pub fn new() -> Self {
        Self
    }

    /// Installed packages. A missing database is an empty toolchain.
    pub async fn load<P: AsRef<Path>>(&self, path: P) -> WtreeResult<Vec<Package>> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No toolchain database at {}", path.display());
            return Ok(Vec::new());
        }
        let content = async_fs::read_to_string(path).await.map_err(|e| {
            WtreeError::filesystem_error_with_source(
                "Could not read toolchain database",
                Some(path.to_path_buf()),
                e,
            )
        })?;
        self.parse(&content)
            .map_err(|e| attach_file(e, path.to_path_buf()))
    }

    pub fn parse(&self, xml: &str) -> WtreeResult<Vec<Package>> {
        let doc = XmlDocument::parse_with_root(xml, "toolchain")?;
        let mut packages = Vec::new();
        for node in doc.children_named(doc.root(), "package") {
            packages.push(parse_installed(&doc, node)?);
        }
        for node in doc.children_named(doc.root(), "svn_package") {
            let name = required(&doc, node, "name", "svn_package")?;
            let url = required(&doc, node, "url", "svn_package")?;
            let mut package = Package::new(name, PackageSource::Svn { url });
            package.path = doc.string_attribute(node, "path").map(PathBuf::from);
            packages.push(package);
        }
        Ok(packages)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P, packages: &[Package]) -> WtreeResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent).await.map_err(|e| {
                WtreeError::filesystem_error_with_source(
                    "Could not create toolchain directory",
                    Some(parent.to_path_buf()),
                    e,
                )
            })?;
        }
        async_fs::write(path, self.to_xml(packages)?).await.map_err(|e| {
            WtreeError::filesystem_error_with_source(
                "Could not write toolchain database",
                Some(path.to_path_buf()),
                e,
            )
        })
    }

    pub fn to_xml(&self, packages: &[Package]) -> WtreeResult<String> {
        let mut root = XmlElement::new("toolchain");
        for package in packages {
            root = root.child(package_element(package));
        }
        Ok(root.to_xml_string()?)
    }

    /// Complete `package` with the `package.xml` found in its directory.
    ///
    /// Paths in `package.xml` are relative to the package directory.
    pub async fn read_package_metadata(&self, package: Package) -> WtreeResult<Package> {
        let Some(dir) = package.path.clone() else {
            return Ok(package);
        };
        let path = dir.join(PACKAGE_FILE);
        if !path.exists() {
            return Ok(package);
        }
        let content = async_fs::read_to_string(&path).await.map_err(|e| {
            WtreeError::filesystem_error_with_source(
                "Could not read package metadata",
                Some(path.clone()),
                e,
            )
        })?;
        apply_package_metadata(package, &dir, &content).map_err(|e| attach_file(e, path))
    }
}

fn parse_installed(doc: &XmlDocument, node: Node) -> WtreeResult<Package> {
    let name = required(doc, node, "name", "package")?;
    let source = match (
        doc.string_attribute(node, "url"),
        doc.string_attribute(node, "directory"),
    ) {
        (Some(url), _) => PackageSource::Archive { url },
        (None, Some(directory)) => PackageSource::LocalDir {
            path: PathBuf::from(directory),
        },
        (None, None) => PackageSource::ToolchainFile,
    };
    let mut package = Package::new(name, source).with_dependencies(read_depends(doc, node)?);
    package.version = doc.string_attribute(node, "version");
    package.path = doc.string_attribute(node, "path").map(PathBuf::from);
    package.toolchain_file = doc.string_attribute(node, "toolchain_file");
    package.sysroot = doc.string_attribute(node, "sysroot");
    Ok(package)
}

fn package_element(package: &Package) -> XmlElement {
    let path = package.path.as_ref().map(|p| p.to_string_lossy().into_owned());
    if let PackageSource::Svn { url } = &package.source {
        return XmlElement::new("svn_package")
            .attr("name", &package.name)
            .attr("url", url)
            .opt_attr("path", path);
    }
    let (url, directory) = match &package.source {
        PackageSource::Archive { url } => (Some(url.clone()), None),
        PackageSource::LocalDir { path } => (None, Some(path.to_string_lossy().into_owned())),
        _ => (None, None),
    };
    let element = XmlElement::new("package")
        .attr("name", &package.name)
        .opt_attr("version", package.version.clone())
        .opt_attr("path", path)
        .opt_attr("url", url)
        .opt_attr("directory", directory)
        .opt_attr("toolchain_file", package.toolchain_file.clone())
        .opt_attr("sysroot", package.sysroot.clone());
    write_depends(element, &package.dependencies)
}

fn apply_package_metadata(mut package: Package, dir: &Path, xml: &str) -> WtreeResult<Package> {
    let doc = XmlDocument::parse_with_root(xml, "package")?;
    let root = doc.root();
    let reroot = |value: String| dir.join(value).to_string_lossy().into_owned();

    if let Some(version) = doc.string_attribute(root, "version") {
        package.version = Some(version);
    }
    if let Some(toolchain_file) = doc.string_attribute(root, "toolchain_file") {
        package.toolchain_file = Some(reroot(toolchain_file));
    }
    if let Some(sysroot) = doc.string_attribute(root, "sysroot") {
        package.sysroot = Some(reroot(sysroot));
    }
    let declared = read_depends(&doc, root)?;
    for phase in [DepPhase::Build, DepPhase::Run, DepPhase::Test] {
        for name in declared.get(phase) {
            package.dependencies.add(phase, name.clone());
        }
    }
    Ok(package)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::package::Dependencies;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn installed() -> Vec<Package> {
        let mut boost = Package::new(
            "boost",
            PackageSource::Archive {
                url: "http://example.com/boost.zip".to_string(),
            },
        )
        .with_version("1.58")
        .with_dependencies(Dependencies::new().with(DepPhase::Run, "zlib"))
        .materialized_at(PathBuf::from("/tc/packages/boost"));
        boost.toolchain_file = Some("/tc/packages/boost/toolchain.cmake".to_string());
        let data = Package::new(
            "data",
            PackageSource::Svn {
                url: "svn://srv/data".to_string(),
            },
        )
        .materialized_at(PathBuf::from("/tc/packages/data"));
        vec![boost, data]
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(TOOLCHAIN_DB_FILE);
        let store = ToolchainStore::new();

        store.save(&path, &installed()).await.unwrap();
        let loaded = store.load(&path).await.unwrap();

        assert_eq!(loaded, installed());
    }

    #[tokio::test]
    async fn test_missing_database_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = ToolchainStore::new()
            .load(temp_dir.path().join(TOOLCHAIN_DB_FILE))
            .await
            .unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_svn_packages_use_their_own_element() {
        let xml = ToolchainStore::new().to_xml(&installed()).unwrap();
        assert!(xml.contains("<svn_package"));
        assert!(xml.contains(r#"version="1.58""#));
    }

    #[tokio::test]
    async fn test_read_package_metadata_reroots_paths() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("ctc");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(PACKAGE_FILE),
            r#"<package name="ctc" version="2.1" toolchain_file="cmake/toolchain.cmake" sysroot="sysroot">
                 <depends buildtime="true" names="boost" />
               </package>"#,
        )
        .unwrap();
        let package = Package::new("ctc", PackageSource::LocalDir { path: dir.clone() })
            .materialized_at(dir.clone());

        let package = ToolchainStore::new()
            .read_package_metadata(package)
            .await
            .unwrap();

        assert_eq!(package.version.as_deref(), Some("2.1"));
        assert_eq!(
            package.toolchain_file,
            Some(dir.join("cmake/toolchain.cmake").to_string_lossy().into_owned())
        );
        assert_eq!(
            package.sysroot,
            Some(dir.join("sysroot").to_string_lossy().into_owned())
        );
        assert_eq!(package.dependencies.build, vec!["boost"]);
    }
}
