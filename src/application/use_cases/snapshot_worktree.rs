use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::services::{SyncOutcome, WorkerPool};
use crate::common::context::Context;
use crate::common::result::WtreeResult;
use crate::domain::entities::repository::HasRemotes;
use crate::domain::entities::snapshot::{Snapshot, SnapshotManifest};
use crate::domain::entities::worktree::GitProject;
use crate::infrastructure::filesystem::{ConfigStore, GitCacheStore, SnapshotStore};
use crate::infrastructure::scm::{Git, GitClient};

/// 各リポジトリの現在のコミットをスナップショットに書き出すユースケース
pub struct GenerateSnapshotUseCase<'a> {
    ctx: &'a Context,
    client: &'a dyn GitClient,
    output: PathBuf,
}

impl<'a> GenerateSnapshotUseCase<'a> {
    /// 新しいGenerateSnapshotUseCaseインスタンスを作成
    pub fn new(ctx: &'a Context, client: &'a dyn GitClient, output: impl Into<PathBuf>) -> Self {
        Self {
            ctx,
            client,
            output: output.into(),
        }
    }

    /// スナップショットを作成して保存する
    ///
    /// HEADを読めないリポジトリは警告して記録しない。
    pub async fn execute(&self) -> WtreeResult<Snapshot> {
        let config = ConfigStore::new().load(self.ctx.config_path()).await?;
        let projects = GitCacheStore::new().load(self.ctx.git_cache_path()).await?;

        let mut snapshot = Snapshot::new(SnapshotManifest::from(&config));
        for project in &projects {
            let git = Git::new(self.client, self.ctx.repo_path(&project.src));
            match git.head_sha1().await {
                Ok(sha1) => snapshot.record(project.src.clone(), sha1),
                Err(e) => warn!("Could not read HEAD of {}: {}", project.src, e),
            }
        }

        if !self.ctx.plan_only {
            SnapshotStore::new().save(&self.output, &snapshot).await?;
            info!("Snapshot written to {}", self.output.display());
        }
        Ok(snapshot)
    }
}

/// スナップショットに記録されたコミットへ各リポジトリを戻すユースケース
pub struct RestoreSnapshotUseCase {
    ctx: Context,
    client: Arc<dyn GitClient>,
    input: PathBuf,
}

impl RestoreSnapshotUseCase {
    /// 新しいRestoreSnapshotUseCaseインスタンスを作成
    pub fn new(ctx: Context, client: Arc<dyn GitClient>, input: impl Into<PathBuf>) -> Self {
        Self {
            ctx,
            client,
            input: input.into(),
        }
    }

    /// 復元を実行し、リポジトリごとの結果を返す
    pub async fn execute(&self) -> WtreeResult<Vec<SyncOutcome>> {
        let snapshot = SnapshotStore::new().load(&self.input).await?;
        let projects = GitCacheStore::new().load(self.ctx.git_cache_path()).await?;
        let by_src: HashMap<String, GitProject> =
            projects.into_iter().map(|p| (p.src.clone(), p)).collect();

        let items: Vec<(String, String, Option<GitProject>)> = snapshot
            .refs
            .into_iter()
            .map(|(src, sha1)| {
                let project = by_src.get(&src).cloned();
                (src, sha1, project)
            })
            .collect();

        let root = self.ctx.worktree_root.clone();
        let client = self.client.clone();
        let plan_only = self.ctx.plan_only;
        WorkerPool::new(self.ctx.jobs)
            .run(items, move |(src, sha1, project)| {
                let path = root.join(&src);
                let client = client.clone();
                async move {
                    let Some(project) = project else {
                        return SyncOutcome::skipped(src, "Not in the worktree");
                    };
                    let git = Git::new(client.as_ref(), path);
                    restore_repo(&git, &project, &sha1, plan_only).await
                }
            })
            .await
    }
}

async fn restore_repo(git: &Git<'_>, project: &GitProject, sha1: &str, plan_only: bool) -> SyncOutcome {
    let src = project.src.clone();
    let mut target = git.rev_parse(sha1).await;
    if target.is_none() {
        if let Some(remote) = project.default_remote() {
            // 未知のコミットはフェッチしてから探す
            if plan_only {
                return SyncOutcome::ok(src, format!("would fetch {} and reset to {}", remote.name, sha1));
            }
            let fetch = git.call(&["fetch", &remote.name]).await;
            if !fetch.is_ok() {
                return SyncOutcome::failed(src, format!("Fetch from {} failed\n{}", remote.name, fetch.output));
            }
        }
        target = git.rev_parse(sha1).await;
    }
    let Some(target) = target else {
        return SyncOutcome::failed(src, format!("Could not parse {} as a valid ref", sha1));
    };

    if git.head_sha1().await.ok().as_deref() == Some(target.as_str()) {
        return SyncOutcome::ok(src, "");
    }
    if !git.is_clean().await {
        return SyncOutcome::skipped(src, "Skipped: worktree is not clean");
    }
    if plan_only {
        return SyncOutcome::ok(src, format!("would reset to {}", target));
    }
    let reset = git.call(&["reset", "--hard", &target]).await;
    if reset.is_ok() {
        SyncOutcome::ok(src, format!("reset to {}", target))
    } else {
        SyncOutcome::failed(src, format!("Reset to {} failed\n{}", target, reset.output))
    }
}
