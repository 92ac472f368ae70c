use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs as async_fs;
use tracing::{error, info};

use super::worker_pool::WorkerPool;
use crate::common::error::WtreeError;
use crate::common::result::{ResultExt, WtreeResult};
use crate::domain::entities::repository::RepoSpec;
use crate::domain::entities::worktree::GitProject;
use crate::domain::services::repo_diff::RepoDiff;
use crate::infrastructure::scm::{Git, GitClient};

/// 差分の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoAction {
    Remove,
    Add,
    Move,
    Update,
}

impl fmt::Display for RepoAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Remove => "remove",
            Self::Add => "add",
            Self::Move => "move",
            Self::Update => "update",
        };
        write!(f, "{}", text)
    }
}

/// 1つのリポジトリに対する差分適用の結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoResult {
    /// 適用後のsrc
    pub src: String,
    pub action: RepoAction,
    pub success: bool,
    pub message: String,
}

impl RepoResult {
    fn from_step(src: &str, action: RepoAction, step: WtreeResult<String>) -> Self {
        let (success, message) = match step {
            Ok(message) => (true, message),
            Err(e) => {
                error!("{} {}: {}", action, src, e);
                (false, e.to_string())
            }
        };
        Self {
            src: src.to_string(),
            action,
            success,
            message,
        }
    }
}

/// ワークツリーに差分を適用するサービス
///
/// 削除、追加、移動、更新の順に実行する。各リポジトリの失敗は記録されるだけで、
/// 残りのリポジトリや後続のフェーズは止めない。再実行すれば続きから再開できる。
pub struct WorktreeReconciler {
    root: PathBuf,
    client: Arc<dyn GitClient>,
    pool: WorkerPool,
}

impl WorktreeReconciler {
    /// 新しいWorktreeReconcilerインスタンスを作成
    pub fn new(root: impl Into<PathBuf>, client: Arc<dyn GitClient>, pool: WorkerPool) -> Self {
        Self {
            root: root.into(),
            client,
            pool,
        }
    }

    /// 差分を適用し、`projects`をディスク上に実際にあるリポジトリに合わせる
    pub async fn apply(&self, diff: &RepoDiff, projects: &mut Vec<GitProject>) -> WtreeResult<Vec<RepoResult>> {
        let mut results = Vec::new();

        for repo in &diff.to_remove {
            let step = self.remove(repo).await;
            if step.is_ok() {
                projects.retain(|p| p.src != repo.src);
            }
            results.push(RepoResult::from_step(&repo.src, RepoAction::Remove, step));
        }

        // 入れ子のsrcは親リポジトリができてからクローンする
        for wave in add_waves(&diff.to_add) {
            let root = self.root.clone();
            let client = self.client.clone();
            let added = self
                .pool
                .run(wave, move |repo| {
                    let root = root.clone();
                    let client = client.clone();
                    async move {
                        let step = add(client.as_ref(), &root, &repo).await;
                        (repo, step)
                    }
                })
                .await?;
            for (repo, step) in added {
                if step.is_ok() {
                    upsert(projects, &repo);
                }
                results.push(RepoResult::from_step(&repo.src, RepoAction::Add, step));
            }
        }

        for repo_move in &diff.to_move {
            let step = self.move_repo(&repo_move.old, &repo_move.new).await;
            if step.is_ok() {
                projects.retain(|p| p.src != repo_move.old.src);
                upsert(projects, &repo_move.new);
            }
            results.push(RepoResult::from_step(&repo_move.new.src, RepoAction::Move, step));
        }

        for update in &diff.to_update {
            let step = self.update(&update.new).await;
            if step.is_ok() {
                upsert(projects, &update.new);
            }
            results.push(RepoResult::from_step(&update.new.src, RepoAction::Update, step));
        }

        projects.sort_by(|a, b| a.src.cmp(&b.src));
        Ok(results)
    }

    async fn remove(&self, repo: &RepoSpec) -> WtreeResult<String> {
        let path = self.root.join(&repo.src);
        info!("Removing {}", repo.src);
        if path.exists() {
            async_fs::remove_dir_all(&path)
                .await
                .with_filesystem_error(format!("Could not remove {}", repo.src), Some(path.clone()))?;
        }
        Ok(format!("removed {}", repo.src))
    }

    async fn move_repo(&self, old: &RepoSpec, new: &RepoSpec) -> WtreeResult<String> {
        let from = self.root.join(&old.src);
        let to = self.root.join(&new.src);
        info!("Moving {} to {}", old.src, new.src);
        if to.exists() {
            return Err(WtreeError::repository_error(
                format!("Could not move {} to {}: {} already exists", old.src, new.src, to.display()),
                Some(new.src.clone()),
            ));
        }
        create_parent(&to).await?;
        async_fs::rename(&from, &to).await.with_filesystem_error(
            format!("Could not move {} to {}", old.src, new.src),
            Some(from.clone()),
        )?;
        Git::new(self.client.as_ref(), &to).apply_repo_config(new).await?;
        Ok(format!("moved {} to {}", old.src, new.src))
    }

    async fn update(&self, repo: &RepoSpec) -> WtreeResult<String> {
        info!("Updating {}", repo.src);
        Git::new(self.client.as_ref(), self.root.join(&repo.src))
            .apply_repo_config(repo)
            .await?;
        Ok(format!("updated {}", repo.src))
    }
}

async fn add(client: &dyn GitClient, root: &Path, repo: &RepoSpec) -> WtreeResult<String> {
    let path = root.join(&repo.src);
    let git = Git::new(client, &path);
    // 既存のリポジトリは設定だけを更新する
    if path.join(".git").exists() {
        info!("{} already exists, configuring it", repo.src);
        git.apply_repo_config(repo).await?;
        return Ok(format!("configured {}", repo.src));
    }
    if path.exists() {
        return Err(WtreeError::repository_error(
            format!("{} already exists and is not a git repository", path.display()),
            Some(repo.src.clone()),
        ));
    }
    info!("Cloning {}", repo.src);
    create_parent(&path).await?;
    git.clone_repo(repo).await?;
    git.apply_repo_config(repo).await?;
    Ok(format!("cloned {}", repo.src))
}

async fn create_parent(path: &Path) -> WtreeResult<()> {
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .with_filesystem_error("Could not create parent directory", Some(parent.to_path_buf()))?;
    }
    Ok(())
}

/// 追加するリポジトリを入れ子の深さごとにまとめる
///
/// 同じ波の中のリポジトリは互いに含まれないので並列にクローンできる。
fn add_waves(repos: &[RepoSpec]) -> Vec<Vec<RepoSpec>> {
    let mut waves: Vec<Vec<RepoSpec>> = Vec::new();
    for repo in repos {
        let depth = repos
            .iter()
            .filter(|other| is_nested_in(&repo.src, &other.src))
            .count();
        if waves.len() <= depth {
            waves.resize_with(depth + 1, Vec::new);
        }
        waves[depth].push(repo.clone());
    }
    waves
}

fn is_nested_in(src: &str, parent: &str) -> bool {
    src.len() > parent.len()
        && src.starts_with(parent)
        && src.as_bytes()[parent.len()] == b'/'
}

fn upsert(projects: &mut Vec<GitProject>, repo: &RepoSpec) {
    match projects.iter_mut().find(|p| p.src == repo.src) {
        Some(project) => project.apply_repo_config(repo),
        None => projects.push(GitProject::from_repo(repo)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn srcs(wave: &[RepoSpec]) -> Vec<&str> {
        wave.iter().map(|r| r.src.as_str()).collect()
    }

    #[test]
    fn test_nested_sources_are_added_after_their_parent() {
        let repos = vec![
            RepoSpec::new("foo/bar.git"),
            RepoSpec::new("foo.git"),
            RepoSpec::new("foobar.git"),
            RepoSpec::new("foo/bar/baz.git"),
        ];

        let waves = add_waves(&repos);

        assert_eq!(waves.len(), 3);
        assert_eq!(srcs(&waves[0]), vec!["foo", "foobar"]);
        assert_eq!(srcs(&waves[1]), vec!["foo/bar"]);
        assert_eq!(srcs(&waves[2]), vec!["foo/bar/baz"]);
    }

    #[test]
    fn test_nested_without_parent_in_the_same_diff() {
        let waves = add_waves(&[RepoSpec::new("foo/bar.git"), RepoSpec::new("baz.git")]);
        assert_eq!(waves.len(), 1);
        assert_eq!(srcs(&waves[0]), vec!["foo/bar", "baz"]);
    }
}
