use std::path::PathBuf;
use tokio::fs as async_fs;
use tracing::info;

use crate::common::context::Context;
use crate::common::error::WtreeError;
use crate::common::result::WtreeResult;
use crate::domain::entities::manifest::Manifest;
use crate::domain::entities::repository::{Remote, RepoSpec};
use crate::domain::entities::worktree::WorktreeConfig;
use crate::domain::value_objects::remote_url::{CachedUsernameLookup, StaticUsernames};
use crate::infrastructure::filesystem::manifest_store::MANIFEST_FILE_NAME;
use crate::infrastructure::filesystem::{ConfigStore, ManifestStore};
use crate::infrastructure::scm::{Git, GitClient};

/// ワークツリー初期化の設定
#[derive(Debug, Clone, Default)]
pub struct InitWorktreeConfig {
    /// マニフェストリポジトリのURL
    pub url: String,
    /// マニフェストのブランチ（Noneの場合はmaster）
    pub branch: Option<String>,
    /// 使用するグループ
    pub groups: Vec<String>,
    /// 全リポジトリを使用するか
    pub all_repos: bool,
    /// マニフェストの固定ref
    pub fixed_ref: Option<String>,
}

impl InitWorktreeConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_all_repos(mut self, all_repos: bool) -> Self {
        self.all_repos = all_repos;
        self
    }

    pub fn with_fixed_ref(mut self, fixed_ref: impl Into<String>) -> Self {
        self.fixed_ref = Some(fixed_ref.into());
        self
    }
}

/// ワークツリー初期化のユースケース
///
/// 設定を書き出し、マニフェストリポジトリを取得する。
/// リポジトリの取得は続く同期で行う。
pub struct InitWorktreeUseCase<'a> {
    ctx: &'a Context,
    client: &'a dyn GitClient,
    config: InitWorktreeConfig,
}

impl<'a> InitWorktreeUseCase<'a> {
    /// 新しいInitWorktreeUseCaseインスタンスを作成
    pub fn new(ctx: &'a Context, client: &'a dyn GitClient, config: InitWorktreeConfig) -> Self {
        Self { ctx, client, config }
    }

    /// 初期化を実行
    pub async fn execute(&self) -> WtreeResult<WorktreeConfig> {
        // 1. 設定の変更（既存の設定は上書き）
        let mut config = WorktreeConfig::new(self.config.url.clone())
            .with_groups(self.config.groups.clone())
            .with_all_repos(self.config.all_repos);
        if let Some(branch) = &self.config.branch {
            config.branch = branch.clone();
        }
        config.fixed_ref = self.config.fixed_ref.clone();

        if self.ctx.plan_only {
            return Ok(config);
        }

        // 2. 設定の保存
        async_fs::create_dir_all(self.ctx.metadata_dir())
            .await
            .map_err(|e| {
                WtreeError::filesystem_error_with_source(
                    "Could not create metadata directory",
                    Some(self.ctx.metadata_dir()),
                    e,
                )
            })?;
        ConfigStore::new().save(self.ctx.config_path(), &config).await?;
        info!("Initialized worktree in {}", self.ctx.worktree_root.display());

        // 3. マニフェストの取得と検証
        update_manifest_repo(self.ctx, self.client, &config).await?;
        read_manifest(self.ctx, &config).await?;
        Ok(config)
    }
}

/// マニフェストリポジトリをクローン、または設定されたブランチ/refに合わせる
///
/// 失敗すると安全な同期ができないので、設定エラーとして扱う。
pub(crate) async fn update_manifest_repo(
    ctx: &Context,
    client: &dyn GitClient,
    config: &WorktreeConfig,
) -> WtreeResult<()> {
    let path = ctx.manifest_repo_path();
    let git = Git::new(client, &path);
    let mut spec = RepoSpec::new("manifest")
        .with_src(path.to_string_lossy().into_owned())
        .with_remote(Remote::new("origin", config.url.clone()).with_default(true));
    spec = match &config.fixed_ref {
        Some(fixed_ref) => spec.with_fixed_ref(fixed_ref.clone()),
        None => spec.with_default_branch(config.branch.clone()),
    };

    if !path.exists() {
        info!("Cloning manifest from {}", config.url);
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent).await?;
        }
        return git.clone_repo(&spec).await.map_err(|e| {
            WtreeError::config_error_with_source("Could not clone the manifest repository", e)
        });
    }

    info!("Updating manifest");
    git.set_remote("origin", &config.url).await?;
    let target = match &config.fixed_ref {
        Some(fixed_ref) => fixed_ref.clone(),
        None => format!("origin/{}", config.branch),
    };
    for args in [vec!["fetch", "origin"], vec!["reset", "--hard", target.as_str()]] {
        let result = git.call(&args).await;
        if !result.is_ok() {
            return Err(WtreeError::config_error(format!(
                "Failed to update the manifest repository: git {} failed\n{}",
                args.join(" "),
                result.output
            )));
        }
    }
    Ok(())
}

/// マニフェストリポジトリ内の`manifest.xml`のパス
pub(crate) fn manifest_path(ctx: &Context) -> PathBuf {
    ctx.manifest_repo_path().join(MANIFEST_FILE_NAME)
}

/// 設定のユーザー名を使ってマニフェストを読み込む
pub(crate) async fn read_manifest(ctx: &Context, config: &WorktreeConfig) -> WtreeResult<Manifest> {
    let usernames = CachedUsernameLookup::new(StaticUsernames::new(config.usernames.clone()));
    ManifestStore::new()
        .read_manifest(manifest_path(ctx), &usernames)
        .await
}
