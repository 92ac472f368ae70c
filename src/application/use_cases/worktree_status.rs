use std::sync::Arc;

use crate::application::services::WorkerPool;
use crate::common::context::Context;
use crate::common::result::WtreeResult;
use crate::domain::entities::worktree::{GitProject, LocalRepoState};
use crate::infrastructure::filesystem::GitCacheStore;
use crate::infrastructure::scm::{Git, GitClient};

/// ワークツリーの状態
#[derive(Debug, Clone, Default)]
pub struct WorktreeStatus {
    /// リポジトリごとの状態（srcの順）
    pub repos: Vec<LocalRepoState>,
    /// キャッシュにあるがディスク上にないリポジトリ
    pub missing: Vec<String>,
}

impl WorktreeStatus {
    /// 変更があるか、正しいブランチにいないリポジトリ
    pub fn not_clean(&self) -> impl Iterator<Item = &LocalRepoState> {
        self.repos
            .iter()
            .filter(|r| !r.clean || (r.project.fixed_ref.is_none() && !r.on_default_branch()))
    }
}

/// ワークツリーの各リポジトリの状態をディスクから読み直すユースケース
pub struct WorktreeStatusUseCase {
    ctx: Context,
    client: Arc<dyn GitClient>,
}

impl WorktreeStatusUseCase {
    /// 新しいWorktreeStatusUseCaseインスタンスを作成
    pub fn new(ctx: Context, client: Arc<dyn GitClient>) -> Self {
        Self { ctx, client }
    }

    /// 状態の取得を実行（ディスクには書き込まない）
    pub async fn execute(&self) -> WtreeResult<WorktreeStatus> {
        let projects = GitCacheStore::new().load(self.ctx.git_cache_path()).await?;
        let (present, missing): (Vec<GitProject>, Vec<GitProject>) = projects
            .into_iter()
            .partition(|p| self.ctx.repo_path(&p.src).exists());

        let root = self.ctx.worktree_root.clone();
        let client = self.client.clone();
        let repos = WorkerPool::new(self.ctx.jobs)
            .run(present, move |project| {
                let path = root.join(&project.src);
                let client = client.clone();
                async move {
                    let git = Git::new(client.as_ref(), path);
                    read_state(&git, project).await
                }
            })
            .await?;

        Ok(WorktreeStatus {
            repos,
            missing: missing.into_iter().map(|p| p.src).collect(),
        })
    }
}

async fn read_state(git: &Git<'_>, project: GitProject) -> LocalRepoState {
    let tracking = project
        .default_branch()
        .and_then(|branch| branch.remote_ref());
    let mut state = LocalRepoState::new(project);
    state.current_branch = git.current_branch().await;
    state.clean = git.is_clean().await;
    if let Some(remote_ref) = tracking {
        if let Some((ahead, behind)) = git.ahead_behind(&remote_ref).await {
            state.ahead = ahead;
            state.behind = behind;
        }
    }
    state
}
