//! パッケージ解決の統合テスト
//!
//! ワークツリーのビルドプロジェクトとツールチェインのデータベースから
//! ビルド順を決める処理と、フィードによるツールチェインの更新を確認する。

mod common;

use async_trait::async_trait;
use common::fixtures::{write_project, TestWorktree, GROUPS_MANIFEST};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wtree::application::use_cases::resolve_deps::{ResolveDepsConfig, ResolveDepsUseCase};
use wtree::application::use_cases::update_toolchain::{
    UpdateToolchainConfig, UpdateToolchainUseCase,
};
use wtree::common::{Context, WtreeError, WtreeResult};
use wtree::domain::entities::package::{Package, PackageSource};
use wtree::domain::entities::worktree::GitProject;
use wtree::domain::value_objects::project_ref::ProjectRef;
use wtree::infrastructure::filesystem::{FeedStore, PackageInstaller};
use wtree::infrastructure::{GitCacheStore, HttpFetcher, ToolchainStore};

const HELLO: &str = r#"<project name="hello">
  <depends buildtime="true" runtime="true" names="world" />
</project>"#;

const WORLD: &str = r#"<project name="world" />"#;

/// helloとworldを追跡しているワークツリー
async fn hello_world_worktree() -> TestWorktree {
    let worktree = TestWorktree::new(GROUPS_MANIFEST);
    write_project(worktree.root(), "hello", HELLO);
    write_project(worktree.root(), "world", WORLD);
    GitCacheStore::new()
        .save(
            worktree.context().git_cache_path(),
            &[GitProject::new("hello"), GitProject::new("world")],
        )
        .await
        .unwrap();
    worktree
}

async fn toolchain_with(dir: &Path, packages: &[Package]) {
    ToolchainStore::new()
        .save(dir.join("toolchain.xml"), packages)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_project_dependency_comes_first() {
    let worktree = hello_world_worktree().await;
    let ctx = worktree.context();
    let config = ResolveDepsConfig::new(vec![ProjectRef::Name("hello".to_string())]);

    let report = ResolveDepsUseCase::new(&ctx, config).execute().await.unwrap();

    assert_eq!(report.result.projects, vec!["world", "hello"]);
    assert!(report.result.packages.is_empty());
    assert!(report.result.not_found.is_empty());
}

#[tokio::test]
async fn test_package_only_dependency() {
    let worktree = TestWorktree::new(GROUPS_MANIFEST);
    write_project(worktree.root(), "hello", HELLO);
    GitCacheStore::new()
        .save(worktree.context().git_cache_path(), &[GitProject::new("hello")])
        .await
        .unwrap();
    let toolchain = TempDir::new().unwrap();
    toolchain_with(
        toolchain.path(),
        &[Package::new("world", PackageSource::ToolchainFile)],
    )
    .await;

    let ctx = worktree.context();
    let config = ResolveDepsConfig::new(vec![ProjectRef::Name("hello".to_string())])
        .with_toolchain_dir(toolchain.path());
    let report = ResolveDepsUseCase::new(&ctx, config).execute().await.unwrap();

    assert_eq!(report.result.projects, vec!["hello"]);
    assert_eq!(report.result.packages, vec!["world"]);
    assert!(report.result.not_found.is_empty());
}

#[tokio::test]
async fn test_path_is_resolved_to_project_name() {
    let worktree = hello_world_worktree().await;
    let ctx = worktree.context();
    let config = ResolveDepsConfig::new(vec![ProjectRef::from_arg("hello", worktree.root())]);

    let report = ResolveDepsUseCase::new(&ctx, config).execute().await.unwrap();

    assert_eq!(report.requested, vec!["hello"]);
    assert_eq!(report.result.projects, vec!["world", "hello"]);
}

#[tokio::test]
async fn test_unknown_project_is_an_error() {
    let worktree = hello_world_worktree().await;
    let ctx = worktree.context();
    let config = ResolveDepsConfig::new(vec![ProjectRef::Name("nope".to_string())]);

    let err = ResolveDepsUseCase::new(&ctx, config).execute().await.unwrap_err();

    assert!(err.to_string().contains("No such project: nope"));
}

#[tokio::test]
async fn test_strict_mode_rejects_cycles() {
    let worktree = hello_world_worktree().await;
    write_project(
        worktree.root(),
        "world",
        r#"<project name="world"><depends buildtime="true" names="hello" /></project>"#,
    );
    let ctx = worktree.context();

    // 通常のソートは循環を許容する
    let lenient = ResolveDepsConfig::new(vec![ProjectRef::Name("hello".to_string())]);
    let report = ResolveDepsUseCase::new(&ctx, lenient).execute().await.unwrap();
    assert_eq!(report.result.projects.len(), 2);

    let strict =
        ResolveDepsConfig::new(vec![ProjectRef::Name("hello".to_string())]).with_strict(true);
    let err = ResolveDepsUseCase::new(&ctx, strict).execute().await.unwrap_err();
    assert!(matches!(err, WtreeError::CycleError(_)));
}

/// 呼び出しを記録し、ディレクトリだけを作るインストーラ
#[derive(Default)]
struct RecordingInstaller {
    calls: Mutex<Vec<String>>,
    failing: Vec<String>,
}

#[async_trait]
impl PackageInstaller for RecordingInstaller {
    async fn install(&self, package: &Package, packages_dir: &Path) -> WtreeResult<Package> {
        self.calls.lock().unwrap().push(format!("install {}", package.name));
        if self.failing.contains(&package.name) {
            return Err(WtreeError::filesystem_error("download failed", None));
        }
        let dest = packages_dir.join(&package.name);
        std::fs::create_dir_all(&dest).unwrap();
        Ok(package.materialized_at(dest))
    }

    async fn update(&self, package: &Package) -> WtreeResult<()> {
        self.calls.lock().unwrap().push(format!("update {}", package.name));
        Ok(())
    }

    async fn uninstall(&self, package: &Package) -> WtreeResult<()> {
        self.calls.lock().unwrap().push(format!("uninstall {}", package.name));
        Ok(())
    }
}

fn write_feed(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

async fn update(
    ctx: &Context,
    feed: &str,
    toolchain: &Path,
    installer: Arc<RecordingInstaller>,
) -> wtree::application::use_cases::UpdateToolchainReport {
    UpdateToolchainUseCase::new(
        ctx,
        FeedStore::new(HttpFetcher::new().unwrap()),
        installer,
        UpdateToolchainConfig::new(feed, toolchain),
    )
    .execute()
    .await
    .unwrap()
}

#[tokio::test]
async fn test_version_change_is_remove_then_add() {
    let feeds = TempDir::new().unwrap();
    let toolchain = TempDir::new().unwrap();
    let ctx = Context::new(toolchain.path());
    let installer = Arc::new(RecordingInstaller::default());

    let feed = write_feed(
        feeds.path(),
        "feed.xml",
        r#"<toolchain>
             <package name="boost" version="1.44" url="http://example.com/boost-1.44.zip" />
             <package name="qt" version="4.7" url="http://example.com/qt-4.7.zip" />
           </toolchain>"#,
    );
    let report = update(&ctx, &feed, toolchain.path(), installer.clone()).await;
    assert!(report.is_success());
    assert_eq!(report.packages.len(), 2);

    let feed = write_feed(
        feeds.path(),
        "feed.xml",
        r#"<toolchain>
             <package name="boost" version="1.52" url="http://example.com/boost-1.52.zip" />
             <package name="qt" version="4.7" url="http://example.com/qt-4.7.zip" />
           </toolchain>"#,
    );
    installer.calls.lock().unwrap().clear();
    let report = update(&ctx, &feed, toolchain.path(), installer.clone()).await;

    assert!(report.is_success());
    assert_eq!(
        *installer.calls.lock().unwrap(),
        vec!["uninstall boost", "install boost"]
    );
    let installed = ToolchainStore::new()
        .load(toolchain.path().join("toolchain.xml"))
        .await
        .unwrap();
    let versions: Vec<(String, Option<String>)> = installed
        .into_iter()
        .map(|p| (p.name, p.version))
        .collect();
    assert_eq!(
        versions,
        vec![
            ("boost".to_string(), Some("1.52".to_string())),
            ("qt".to_string(), Some("4.7".to_string())),
        ]
    );
}

#[tokio::test]
async fn test_packages_missing_from_feed_are_removed() {
    let feeds = TempDir::new().unwrap();
    let toolchain = TempDir::new().unwrap();
    let ctx = Context::new(toolchain.path());
    let installer = Arc::new(RecordingInstaller::default());
    toolchain_with(
        toolchain.path(),
        &[Package::new(
            "old",
            PackageSource::Archive {
                url: "http://example.com/old.zip".to_string(),
            },
        )
        .materialized_at(PathBuf::from("/tc/packages/old"))],
    )
    .await;

    let feed = write_feed(feeds.path(), "feed.xml", "<toolchain />");
    let report = update(&ctx, &feed, toolchain.path(), installer.clone()).await;

    assert_eq!(report.plan.to_remove.len(), 1);
    assert!(report.packages.is_empty());
    assert_eq!(*installer.calls.lock().unwrap(), vec!["uninstall old"]);
}

#[tokio::test]
async fn test_included_feeds_and_local_directories() {
    let feeds = TempDir::new().unwrap();
    let toolchain = TempDir::new().unwrap();
    std::fs::create_dir_all(feeds.path().join("ctc")).unwrap();
    let ctx = Context::new(toolchain.path());
    let installer = Arc::new(RecordingInstaller::default());

    write_feed(
        feeds.path(),
        "cross.xml",
        r#"<toolchain><package name="ctc" directory="ctc" toolchain_file="toolchain.cmake" /></toolchain>"#,
    );
    let feed = write_feed(
        feeds.path(),
        "feed.xml",
        r#"<toolchain>
             <feed name="cross" />
             <svn_package name="data" url="svn://example.com/data" />
           </toolchain>"#,
    );
    let report = update(&ctx, &feed, toolchain.path(), installer.clone()).await;
    assert!(report.is_success());

    let names: Vec<&str> = report.packages.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names.len(), 2);
    let ctc = report.packages.iter().find(|p| p.name == "ctc").unwrap();
    assert_eq!(
        ctc.source,
        PackageSource::LocalDir {
            path: feeds.path().join("ctc")
        }
    );
    assert_eq!(
        ctc.toolchain_file.as_deref(),
        Some(feeds.path().join("toolchain.cmake").to_string_lossy().as_ref())
    );

    // 次の実行ではsvnパッケージをその場で更新する
    installer.calls.lock().unwrap().clear();
    update(&ctx, &feed, toolchain.path(), installer.clone()).await;
    assert_eq!(*installer.calls.lock().unwrap(), vec!["update data"]);
}

#[tokio::test]
async fn test_failed_install_is_reported_and_not_recorded() {
    let feeds = TempDir::new().unwrap();
    let toolchain = TempDir::new().unwrap();
    let ctx = Context::new(toolchain.path());
    let installer = Arc::new(RecordingInstaller {
        failing: vec!["qt".to_string()],
        ..Default::default()
    });

    let feed = write_feed(
        feeds.path(),
        "feed.xml",
        r#"<toolchain>
             <package name="boost" version="1.44" url="http://example.com/boost.zip" />
             <package name="qt" version="4.7" url="http://example.com/qt.zip" />
           </toolchain>"#,
    );
    let report = update(&ctx, &feed, toolchain.path(), installer).await;

    assert!(!report.is_success());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "qt");
    let names: Vec<&str> = report.packages.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["boost"]);
}

#[tokio::test]
async fn test_unreadable_feed_changes_nothing() {
    let toolchain = TempDir::new().unwrap();
    let ctx = Context::new(toolchain.path());
    let installer = Arc::new(RecordingInstaller::default());

    let result = UpdateToolchainUseCase::new(
        &ctx,
        FeedStore::new(HttpFetcher::new().unwrap()),
        installer.clone(),
        UpdateToolchainConfig::new("/does/not/exist.xml", toolchain.path()),
    )
    .execute()
    .await;

    assert!(result.is_err());
    assert!(installer.calls.lock().unwrap().is_empty());
    assert!(!toolchain.path().join("toolchain.xml").exists());
}
