use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::common::context::Context;
use crate::common::result::WtreeResult;
use crate::domain::entities::package::Package;
use crate::infrastructure::filesystem::toolchain_store::TOOLCHAIN_DB_FILE;
use crate::infrastructure::filesystem::{FeedStore, PackageInstaller, ToolchainStore};

/// ツールチェイン更新の設定
#[derive(Debug, Clone)]
pub struct UpdateToolchainConfig {
    /// フィードの場所（ローカルパスまたはURL）
    pub feed: String,
    /// ツールチェインのディレクトリ
    pub toolchain_dir: PathBuf,
}

impl UpdateToolchainConfig {
    pub fn new(feed: impl Into<String>, toolchain_dir: impl Into<PathBuf>) -> Self {
        Self {
            feed: feed.into(),
            toolchain_dir: toolchain_dir.into(),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.toolchain_dir.join(TOOLCHAIN_DB_FILE)
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.toolchain_dir.join("packages")
    }
}

/// パッケージ単位の失敗
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageFailure {
    pub name: String,
    pub message: String,
}

/// パッケージ集合の差分
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageDiff {
    /// 追加するパッケージ（フィード上の定義）
    pub to_add: Vec<Package>,
    /// 削除するパッケージ（データベース上の定義）
    pub to_remove: Vec<Package>,
    /// その場で更新するsvnパッケージ
    pub to_update: Vec<Package>,
}

impl PackageDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty() && self.to_update.is_empty()
    }
}

/// ツールチェイン更新の結果
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateToolchainReport {
    pub plan: PackageDiff,
    /// 更新後のデータベースの内容
    pub packages: Vec<Package>,
    pub failures: Vec<PackageFailure>,
    pub plan_only: bool,
}

impl UpdateToolchainReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// ローカルのパッケージ集合とフィードの差分を名前で計算する
///
/// バージョンやソースの変更は削除と追加になる。両方にあるsvnパッケージは
/// 同じソースであればその場で更新する。
pub fn diff_packages(local: &[Package], remote: &[Package]) -> PackageDiff {
    let local_by_name: HashMap<&str, &Package> =
        local.iter().map(|p| (p.name.as_str(), p)).collect();
    let remote_by_name: HashMap<&str, &Package> =
        remote.iter().map(|p| (p.name.as_str(), p)).collect();

    let mut diff = PackageDiff::default();
    for package in local {
        match remote_by_name.get(package.name.as_str()) {
            None => diff.to_remove.push(package.clone()),
            Some(wanted) if !same_definition(package, wanted) => {
                diff.to_remove.push(package.clone())
            }
            Some(_) => {}
        }
    }
    for package in remote {
        match local_by_name.get(package.name.as_str()) {
            None => diff.to_add.push(package.clone()),
            Some(installed) if !same_definition(installed, package) => {
                diff.to_add.push(package.clone())
            }
            Some(installed) if installed.is_svn() => diff.to_update.push((*installed).clone()),
            Some(_) => {}
        }
    }
    diff
}

/// svnパッケージのバージョンは作業コピーが持つので比較しない
fn same_definition(installed: &Package, wanted: &Package) -> bool {
    installed.source == wanted.source && (installed.is_svn() || installed.version == wanted.version)
}

/// ツールチェインをフィードに合わせるユースケース
pub struct UpdateToolchainUseCase<'a> {
    ctx: &'a Context,
    feeds: FeedStore,
    installer: Arc<dyn PackageInstaller>,
    config: UpdateToolchainConfig,
}

impl<'a> UpdateToolchainUseCase<'a> {
    /// 新しいUpdateToolchainUseCaseインスタンスを作成
    pub fn new(
        ctx: &'a Context,
        feeds: FeedStore,
        installer: Arc<dyn PackageInstaller>,
        config: UpdateToolchainConfig,
    ) -> Self {
        Self {
            ctx,
            feeds,
            installer,
            config,
        }
    }

    /// 更新を実行
    ///
    /// フィードが読めない場合は何も変更せずにエラーを返す。
    /// パッケージ単位の失敗はレポートに入り、データベースには成功した分だけが残る。
    pub async fn execute(&self) -> WtreeResult<UpdateToolchainReport> {
        let remote = self.feeds.read_feed(&self.config.feed).await?;
        let store = ToolchainStore::new();
        let local = store.load(self.config.database_path()).await?;
        let plan = diff_packages(&local, &remote);
        info!(
            "Toolchain update: {} to add, {} to remove, {} to update",
            plan.to_add.len(),
            plan.to_remove.len(),
            plan.to_update.len()
        );

        let mut report = UpdateToolchainReport {
            plan,
            plan_only: self.ctx.plan_only,
            ..Default::default()
        };
        if self.ctx.plan_only {
            report.packages = local;
            return Ok(report);
        }

        let mut installed: Vec<Package> = local;
        for package in &report.plan.to_remove {
            match self.installer.uninstall(package).await {
                Ok(()) => installed.retain(|p| p.name != package.name),
                Err(e) => self.record_failure(&mut report.failures, &package.name, e.to_string()),
            }
        }

        let packages_dir = self.config.packages_dir();
        for package in &report.plan.to_add {
            // データベースに残った古いエントリは削除に失敗したもの
            if installed.iter().any(|p| p.name == package.name) {
                continue;
            }
            let step = match self.installer.install(package, &packages_dir).await {
                Ok(package) => store.read_package_metadata(package).await,
                Err(e) => Err(e),
            };
            match step {
                Ok(package) => installed.push(package),
                Err(e) => self.record_failure(&mut report.failures, &package.name, e.to_string()),
            }
        }

        for package in &report.plan.to_update {
            if let Err(e) = self.installer.update(package).await {
                self.record_failure(&mut report.failures, &package.name, e.to_string());
            }
        }

        // データベースの順序はフィードに従う
        let order: HashMap<&str, usize> = remote
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.as_str(), i))
            .collect();
        installed.sort_by_key(|p| order.get(p.name.as_str()).copied().unwrap_or(usize::MAX));

        store.save(self.config.database_path(), &installed).await?;
        report.packages = installed;
        Ok(report)
    }

    fn record_failure(&self, failures: &mut Vec<PackageFailure>, name: &str, message: String) {
        error!("Package {}: {}", name, message);
        failures.push(PackageFailure {
            name: name.to_string(),
            message,
        });
    }
}
