use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::init_worktree::{read_manifest, update_manifest_repo};
use crate::application::services::{
    BranchSyncer, GroupResolver, RepoResult, SyncOutcome, WorkerPool, WorktreeReconciler,
};
use crate::common::context::Context;
use crate::common::result::WtreeResult;
use crate::domain::entities::group::GroupError;
use crate::domain::entities::manifest::Manifest;
use crate::domain::entities::repository::RepoSpec;
use crate::domain::entities::worktree::{GitProject, WorktreeConfig};
use crate::domain::services::repo_diff::{compute_diff, RepoDiff};
use crate::infrastructure::filesystem::{ConfigStore, GitCacheStore};
use crate::infrastructure::scm::GitClient;

/// 同期前に設定へ加えるグループの変更
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupChange {
    /// グループを追加
    Add(String),
    /// グループを削除
    Remove(String),
    /// グループを置き換える
    Replace(Vec<String>),
}

/// ワークツリー同期の設定
#[derive(Debug, Clone)]
pub struct SyncWorktreeConfig {
    /// 同期前に適用するグループの変更
    pub group_changes: Vec<GroupChange>,
    /// 全リポジトリ使用の切り替え（Noneなら設定のまま）
    pub all_repos: Option<bool>,
    /// 間違ったブランチにいるリポジトリを正しいブランチに切り替えるか
    pub correct_branch: bool,
    /// マニフェストリポジトリを更新するか
    pub update_manifest: bool,
}

impl Default for SyncWorktreeConfig {
    fn default() -> Self {
        Self {
            group_changes: Vec::new(),
            all_repos: None,
            correct_branch: true,
            update_manifest: true,
        }
    }
}

impl SyncWorktreeConfig {
    pub fn with_group_change(mut self, change: GroupChange) -> Self {
        self.group_changes.push(change);
        self
    }

    pub fn with_all_repos(mut self, all_repos: bool) -> Self {
        self.all_repos = Some(all_repos);
        self
    }

    pub fn with_correct_branch(mut self, correct_branch: bool) -> Self {
        self.correct_branch = correct_branch;
        self
    }

    pub fn with_update_manifest(mut self, update_manifest: bool) -> Self {
        self.update_manifest = update_manifest;
        self
    }
}

/// 同期の結果
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// 計算された差分
    pub plan: RepoDiff,
    /// 差分適用の結果（リポジトリごと）
    pub repos: Vec<RepoResult>,
    /// ブランチ同期の結果（リポジトリごと）
    pub branches: Vec<SyncOutcome>,
    /// 計画のみでディスクに触れていないか
    pub plan_only: bool,
}

impl SyncReport {
    /// 全リポジトリが成功したか
    pub fn is_success(&self) -> bool {
        self.repos.iter().all(|r| r.success) && !self.branches.iter().any(|b| b.is_failed())
    }

    /// 失敗したリポジトリのメッセージ
    pub fn errors(&self) -> Vec<String> {
        let repos = self
            .repos
            .iter()
            .filter(|r| !r.success)
            .map(|r| format!("{} {}: {}", r.action, r.src, r.message));
        let branches = self
            .branches
            .iter()
            .filter(|b| b.is_failed())
            .map(|b| format!("{}: {}", b.src, b.message));
        repos.chain(branches).collect()
    }
}

/// ワークツリー同期のユースケース
///
/// マニフェストの更新、設定の変更と保存、差分の計算と適用、
/// ローカルキャッシュの書き直し、ブランチの同期の順に行う。
pub struct SyncWorktreeUseCase {
    ctx: Context,
    client: Arc<dyn GitClient>,
    config: SyncWorktreeConfig,
}

impl SyncWorktreeUseCase {
    /// 新しいSyncWorktreeUseCaseインスタンスを作成
    pub fn new(ctx: Context, client: Arc<dyn GitClient>, config: SyncWorktreeConfig) -> Self {
        Self { ctx, client, config }
    }

    /// 同期を実行
    ///
    /// 検証エラーは副作用の前に返る。リポジトリごとの失敗はレポートに入る。
    /// `plan_only`の場合は差分を計算するだけで、設定もディスクも変更しない。
    pub async fn execute(&self) -> WtreeResult<SyncReport> {
        let config_store = ConfigStore::new();
        let mut config = config_store.load(self.ctx.config_path()).await?;

        // 1. マニフェストの更新と読み込み
        if self.config.update_manifest && !self.ctx.plan_only {
            update_manifest_repo(&self.ctx, self.client.as_ref(), &config).await?;
        }
        let manifest = read_manifest(&self.ctx, &config).await?;

        // 2. 設定の変更と保存
        if self.mutate(&mut config, &manifest)? && !self.ctx.plan_only {
            config_store.save(self.ctx.config_path(), &config).await?;
        }
        let new_repos =
            GroupResolver::new(&manifest).resolve(config.requested_groups(), config.all_repos)?;

        // 3. ディスク上に残っているリポジトリとの差分
        let cache_store = GitCacheStore::new();
        let mut projects: Vec<GitProject> = cache_store
            .load(self.ctx.git_cache_path())
            .await?
            .into_iter()
            .filter(|p| self.ctx.repo_path(&p.src).exists())
            .collect();
        let old_repos: Vec<RepoSpec> = projects.iter().map(GitProject::to_repo_spec).collect();
        let plan = compute_diff(&old_repos, &new_repos);
        debug!("Sync plan: {:?}", plan);

        let mut report = SyncReport {
            plan,
            plan_only: self.ctx.plan_only,
            ..Default::default()
        };
        if self.ctx.plan_only {
            return Ok(report);
        }

        // 4. 差分の適用とキャッシュの書き直し
        let pool = WorkerPool::new(self.ctx.jobs);
        let reconciler =
            WorktreeReconciler::new(self.ctx.worktree_root.clone(), self.client.clone(), pool);
        report.repos = reconciler.apply(&report.plan, &mut projects).await?;
        cache_store.save(self.ctx.git_cache_path(), &projects).await?;

        // 5. ブランチの同期
        report.branches = self.sync_branches(&new_repos, &projects, pool).await?;
        info!(
            "Synchronized {} repositories, {} failures",
            report.branches.len(),
            report.errors().len()
        );
        Ok(report)
    }

    /// グループの変更を設定に反映し、変更があったかを返す
    ///
    /// グループ未指定の設定にグループを追加すると、それまで使われていた
    /// デフォルトグループも残す。
    fn mutate(&self, config: &mut WorktreeConfig, manifest: &Manifest) -> WtreeResult<bool> {
        let before = config.clone();
        for change in &self.config.group_changes {
            match change {
                GroupChange::Add(group) => {
                    check_group(manifest, group)?;
                    if !config.has_groups() {
                        if let Some(default) = manifest.groups.default_group() {
                            config.add_group(default.name.clone());
                        }
                    }
                    config.add_group(group.clone());
                }
                GroupChange::Remove(group) => {
                    if !config.has_groups() {
                        if let Some(default) = manifest.groups.default_group() {
                            config.add_group(default.name.clone());
                        }
                    }
                    config.remove_group(group);
                }
                GroupChange::Replace(groups) => {
                    for group in groups {
                        check_group(manifest, group)?;
                    }
                    config.set_groups(groups.clone());
                }
            }
        }
        if let Some(all_repos) = self.config.all_repos {
            config.all_repos = all_repos;
        }
        Ok(*config != before)
    }

    async fn sync_branches(
        &self,
        repos: &[RepoSpec],
        projects: &[GitProject],
        pool: WorkerPool,
    ) -> WtreeResult<Vec<SyncOutcome>> {
        let by_src: HashMap<&str, &GitProject> =
            projects.iter().map(|p| (p.src.as_str(), p)).collect();
        let to_sync: Vec<GitProject> = repos
            .iter()
            .filter_map(|repo| by_src.get(repo.src.as_str()).map(|p| (*p).clone()))
            .collect();

        let root = self.ctx.worktree_root.clone();
        let client = self.client.clone();
        let correct_branch = self.config.correct_branch;
        pool.run(to_sync, move |project| {
            let path = root.join(&project.src);
            let client = client.clone();
            async move {
                BranchSyncer::new(client.as_ref(), path, project.src.clone())
                    .with_correct_branch(correct_branch)
                    .sync(&project)
                    .await
            }
        })
        .await
    }
}

fn check_group(manifest: &Manifest, group: &str) -> WtreeResult<()> {
    if manifest.groups.get(group).is_none() {
        return Err(GroupError::NoSuchGroup(group.to_string()).into());
    }
    Ok(())
}
