use std::path::PathBuf;
use tracing::debug;

use crate::application::services::{DepsSolver, SolveResult};
use crate::common::context::Context;
use crate::common::error::WtreeError;
use crate::common::result::WtreeResult;
use crate::domain::entities::package::{BuildProject, Package};
use crate::domain::value_objects::project_ref::ProjectRef;
use crate::infrastructure::filesystem::project_store::PROJECT_FILE_NAME;
use crate::infrastructure::filesystem::toolchain_store::TOOLCHAIN_DB_FILE;
use crate::infrastructure::filesystem::{GitCacheStore, ProjectStore, ToolchainStore};

/// 依存関係解決の設定
#[derive(Debug, Clone, Default)]
pub struct ResolveDepsConfig {
    /// 対象のプロジェクト
    pub projects: Vec<ProjectRef>,
    /// 実行時の依存関係を辿るか（既定はビルド時）
    pub runtime: bool,
    /// テスト時の依存関係も辿るか
    pub test: bool,
    /// パッケージを提供するツールチェインのディレクトリ
    pub toolchain_dir: Option<PathBuf>,
    /// 循環依存をエラーにするか
    pub strict: bool,
}

impl ResolveDepsConfig {
    pub fn new(projects: Vec<ProjectRef>) -> Self {
        Self {
            projects,
            ..Default::default()
        }
    }

    pub fn with_runtime(mut self, runtime: bool) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    pub fn with_toolchain_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.toolchain_dir = Some(dir.into());
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// 依存関係解決の結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveDepsReport {
    /// 解決済みの名前
    pub requested: Vec<String>,
    pub result: SolveResult,
    /// 要求されたプロジェクトに直接依存するプロジェクト
    pub reverse_deps: Vec<String>,
}

/// ワークツリーのビルドプロジェクトとツールチェインのパッケージから
/// ビルド順を決めるユースケース
pub struct ResolveDepsUseCase<'a> {
    ctx: &'a Context,
    config: ResolveDepsConfig,
}

impl<'a> ResolveDepsUseCase<'a> {
    /// 新しいResolveDepsUseCaseインスタンスを作成
    pub fn new(ctx: &'a Context, config: ResolveDepsConfig) -> Self {
        Self { ctx, config }
    }

    /// 解決を実行
    pub async fn execute(&self) -> WtreeResult<ResolveDepsReport> {
        let projects = self.load_projects().await?;
        let packages = self.load_packages().await?;
        let requested = self.resolve_refs().await?;
        debug!("Resolving dependencies of {:?}", requested);

        let solver = DepsSolver::new(&projects, &packages);
        let phases = DepsSolver::phases(self.config.runtime, self.config.test);
        if self.config.strict {
            solver.check_cycles(&phases)?;
        }
        let result = solver.solve(&requested, self.config.runtime, self.config.test)?;
        let reverse_deps = solver.reverse_deps(&requested, &phases);
        Ok(ResolveDepsReport {
            requested,
            result,
            reverse_deps,
        })
    }

    async fn load_projects(&self) -> WtreeResult<Vec<BuildProject>> {
        let srcs: Vec<String> = GitCacheStore::new()
            .load(self.ctx.git_cache_path())
            .await?
            .into_iter()
            .map(|p| p.src)
            .collect();
        ProjectStore::new()
            .discover(&self.ctx.worktree_root, &srcs)
            .await
    }

    async fn load_packages(&self) -> WtreeResult<Vec<Package>> {
        match &self.config.toolchain_dir {
            Some(dir) => ToolchainStore::new().load(dir.join(TOOLCHAIN_DB_FILE)).await,
            None => Ok(Vec::new()),
        }
    }

    /// パスで指定されたプロジェクトは`qiproject.xml`から名前を読む
    async fn resolve_refs(&self) -> WtreeResult<Vec<String>> {
        let store = ProjectStore::new();
        let mut names = Vec::new();
        for project in &self.config.projects {
            let name = match project {
                ProjectRef::Name(name) => name.clone(),
                ProjectRef::Path(path) => {
                    let file = path.join(PROJECT_FILE_NAME);
                    if !file.exists() {
                        return Err(WtreeError::validation_error(format!(
                            "Could not find a build project in {}",
                            path.display()
                        )));
                    }
                    store.read_project(&file).await?.name
                }
            };
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }
}
