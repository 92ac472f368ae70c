use async_trait::async_trait;
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tar::Archive;
use tokio::fs as async_fs;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::common::error::WtreeError;
use crate::common::result::{ResultExt, WtreeResult};
use crate::domain::entities::package::{Package, PackageSource};
use crate::infrastructure::network::HttpFetcher;
use crate::infrastructure::scm::SvnClient;

/// Materializes packages inside a toolchain's package directory
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Make `package` available and return it with its location set.
    async fn install(&self, package: &Package, packages_dir: &Path) -> WtreeResult<Package>;

    /// Update an svn package in place.
    async fn update(&self, package: &Package) -> WtreeResult<()>;

    /// Remove what [`PackageInstaller::install`] created.
    async fn uninstall(&self, package: &Package) -> WtreeResult<()>;
}

/// Archive formats the installer knows how to extract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    Zip,
    Tar,
    TarGz,
    TarBz2,
}

impl ArchiveKind {
    fn from_location(location: &str) -> Option<Self> {
        let lower = location.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".tar.bz2") || lower.ends_with(".tbz2") {
            Some(Self::TarBz2)
        } else if lower.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }

    /// Blocking extraction of `archive` into `dest`.
    fn extract(self, archive: &Path, dest: &Path) -> WtreeResult<()> {
        let file = File::open(archive)
            .with_filesystem_error("Could not open package archive", Some(archive.to_path_buf()))?;
        match self {
            Self::Zip => {
                let mut zip = ZipArchive::new(file).map_err(|e| invalid_archive(archive, e))?;
                zip.extract(dest).map_err(|e| invalid_archive(archive, e))
            }
            Self::Tar => unpack_tar(file, archive, dest),
            Self::TarGz => unpack_tar(GzDecoder::new(file), archive, dest),
            Self::TarBz2 => unpack_tar(BzDecoder::new(file), archive, dest),
        }
    }
}

fn unpack_tar(reader: impl Read, archive: &Path, dest: &Path) -> WtreeResult<()> {
    Archive::new(reader)
        .unpack(dest)
        .map_err(|e| invalid_archive(archive, e))
}

fn invalid_archive(archive: &Path, error: impl std::fmt::Display) -> WtreeError {
    WtreeError::filesystem_error(
        format!("Could not extract package archive: {}", error),
        Some(archive.to_path_buf()),
    )
}

/// [`PackageInstaller`] downloading over http and extracting zip and tar archives
pub struct DefaultPackageInstaller {
    fetcher: HttpFetcher,
    svn: Arc<dyn SvnClient>,
    timeout: Option<Duration>,
}

impl DefaultPackageInstaller {
    pub fn new(fetcher: HttpFetcher, svn: Arc<dyn SvnClient>) -> Self {
        Self {
            fetcher,
            svn,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn install_archive(&self, name: &str, url: &str, packages_dir: &Path) -> WtreeResult<PathBuf> {
        let kind = ArchiveKind::from_location(url).ok_or_else(|| {
            WtreeError::validation_error(format!(
                "Unsupported archive format for package {}: {}",
                name, url
            ))
        })?;
        let dest = packages_dir.join(name);
        let staging = packages_dir.join(format!(".{}.extract", name));
        remove_if_exists(&staging).await?;
        async_fs::create_dir_all(&staging).await.map_err(|e| {
            WtreeError::filesystem_error_with_source(
                "Could not create extraction directory",
                Some(staging.clone()),
                e,
            )
        })?;

        let (archive, downloaded) = if HttpFetcher::is_remote(url) {
            let file_name = url.rsplit('/').next().unwrap_or(name);
            let archive = packages_dir.join(format!(".{}", file_name));
            self.fetcher.download(url, &archive).await?;
            (archive, true)
        } else {
            (PathBuf::from(url), false)
        };

        let extracted = self.extract(kind, &archive, &staging).await;
        if downloaded {
            let _ = async_fs::remove_file(&archive).await;
        }
        if let Err(e) = extracted {
            let _ = async_fs::remove_dir_all(&staging).await;
            return Err(e);
        }

        remove_if_exists(&dest).await?;
        let top = single_top_directory(&staging).await?;
        let source = top.as_deref().unwrap_or(&staging);
        async_fs::rename(source, &dest).await.map_err(|e| {
            WtreeError::filesystem_error_with_source(
                "Could not move extracted package",
                Some(dest.clone()),
                e,
            )
        })?;
        remove_if_exists(&staging).await?;
        Ok(dest)
    }

    async fn extract(&self, kind: ArchiveKind, archive: &Path, dest: &Path) -> WtreeResult<()> {
        debug!("Extracting {} into {}", archive.display(), dest.display());
        let (archive, dest) = (archive.to_path_buf(), dest.to_path_buf());
        let task = tokio::task::spawn_blocking(move || kind.extract(&archive, &dest));
        let joined = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, task)
                .await
                .map_err(|_| WtreeError::timeout(limit.as_secs()))?,
            None => task.await,
        };
        joined.map_err(|e| WtreeError::internal_error(format!("Extraction task failed: {}", e)))?
    }
}

#[async_trait]
impl PackageInstaller for DefaultPackageInstaller {
    async fn install(&self, package: &Package, packages_dir: &Path) -> WtreeResult<Package> {
        info!("Adding package {}", package.name);
        match &package.source {
            PackageSource::Archive { url } => {
                let path = self.install_archive(&package.name, url, packages_dir).await?;
                Ok(package.materialized_at(path))
            }
            PackageSource::Svn { url } => {
                let dest = packages_dir.join(&package.name);
                async_fs::create_dir_all(packages_dir).await?;
                self.svn.checkout(url, &dest).await?;
                Ok(package.materialized_at(dest))
            }
            PackageSource::LocalDir { path } => {
                if !path.is_dir() {
                    return Err(WtreeError::filesystem_error(
                        format!("Package directory for {} does not exist", package.name),
                        Some(path.clone()),
                    ));
                }
                Ok(package.materialized_at(path.clone()))
            }
            PackageSource::ToolchainFile => Ok(package.clone()),
        }
    }

    async fn update(&self, package: &Package) -> WtreeResult<()> {
        match &package.path {
            Some(path) if package.is_svn() => {
                info!("Updating svn package {}", package.name);
                self.svn.update(path).await
            }
            _ => Ok(()),
        }
    }

    async fn uninstall(&self, package: &Package) -> WtreeResult<()> {
        info!("Removing package {}", package.name);
        match (&package.source, &package.path) {
            (PackageSource::Archive { .. } | PackageSource::Svn { .. }, Some(path)) => {
                remove_if_exists(path).await
            }
            _ => Ok(()),
        }
    }
}

async fn remove_if_exists(path: &Path) -> WtreeResult<()> {
    if !path.exists() {
        return Ok(());
    }
    async_fs::remove_dir_all(path).await.map_err(|e| {
        WtreeError::filesystem_error_with_source(
            "Could not remove directory",
            Some(path.to_path_buf()),
            e,
        )
    })
}

/// The only entry of `dir` when it is a directory.
async fn single_top_directory(dir: &Path) -> WtreeResult<Option<PathBuf>> {
    let mut entries = async_fs::read_dir(dir).await?;
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        found.push(entry.path());
        if found.len() > 1 {
            return Ok(None);
        }
    }
    Ok(found.pop().filter(|p| p.is_dir()))
}
