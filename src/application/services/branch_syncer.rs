use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::domain::entities::repository::{Branch, HasRemotes};
use crate::domain::entities::worktree::GitProject;
use crate::infrastructure::scm::{Git, GitClient};

/// リポジトリごとの同期結果の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// 成功
    Ok,
    /// 何もしなかった（エラーではない）
    Skipped,
    /// 失敗
    Failed,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Ok => "ok",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        };
        write!(f, "{}", text)
    }
}

/// 1つのリポジトリの同期結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    /// リポジトリのsrc
    pub src: String,
    /// 結果の種類
    pub status: SyncStatus,
    /// ユーザー向けのメッセージ
    pub message: String,
}

impl SyncOutcome {
    pub fn ok(src: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(src, SyncStatus::Ok, message)
    }

    pub fn skipped(src: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(src, SyncStatus::Skipped, message)
    }

    pub fn failed(src: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(src, SyncStatus::Failed, message)
    }

    fn new(src: impl Into<String>, status: SyncStatus, message: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            status,
            message: message.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == SyncStatus::Failed
    }
}

type Step<T> = Result<T, SyncOutcome>;

/// 1つのリポジトリのブランチをリモートに追従させる
///
/// 処理の流れ: サブモジュール確認、ブランチ確認、fetch、ref比較、
/// 必要ならstash、rebase、失敗時はrebase --abort。
/// 同期済みのブランチは決してrebaseしない。
pub struct BranchSyncer<'a> {
    git: Git<'a>,
    src: String,
    correct_branch: bool,
}

impl<'a> BranchSyncer<'a> {
    /// 新しいBranchSyncerインスタンスを作成
    pub fn new(client: &'a dyn GitClient, repo_path: impl Into<PathBuf>, src: impl Into<String>) -> Self {
        Self {
            git: Git::new(client, repo_path),
            src: src.into(),
            correct_branch: false,
        }
    }

    /// 間違ったブランチにいる場合に正しいブランチへ切り替えるか
    pub fn with_correct_branch(mut self, correct_branch: bool) -> Self {
        self.correct_branch = correct_branch;
        self
    }

    /// 同期を実行する（失敗はすべて結果として返す）
    pub async fn sync(&self, project: &GitProject) -> SyncOutcome {
        match self.run(project).await {
            Ok(outcome) | Err(outcome) => {
                debug!("{}: {} {}", outcome.src, outcome.status, outcome.message);
                outcome
            }
        }
    }

    async fn run(&self, project: &GitProject) -> Step<SyncOutcome> {
        self.check_submodules().await?;

        if let Some(fixed_ref) = &project.fixed_ref {
            return self.reset_to_ref(project, fixed_ref).await;
        }

        let branch = project.default_branch().ok_or_else(|| {
            self.skipped("No branch given, and no branch configured by default")
        })?;
        let remote = branch
            .tracks
            .clone()
            .or_else(|| project.default_remote().map(|r| r.name.clone()))
            .ok_or_else(|| self.skipped(format!("No remote tracked by {}", branch.name)))?;

        self.ensure_on_branch(branch).await?;
        self.fetch(&remote).await?;

        let remote_ref = format!("{}/{}", remote, branch.remote_branch_name());
        let local_sha1 = self
            .git
            .get_ref_sha1(&format!("refs/heads/{}", branch.name))
            .await;
        let remote_sha1 = self
            .git
            .get_ref_sha1(&format!("refs/remotes/{}", remote_ref))
            .await;
        if remote_sha1.is_none() {
            return Err(self.failed(format!("Remote branch {} not found", remote_ref)));
        }
        if local_sha1 == remote_sha1 {
            return Ok(self.ok(""));
        }

        let stashed = self.stash_if_dirty().await?;
        self.rebase(&remote_ref, stashed).await
    }

    async fn check_submodules(&self) -> Step<()> {
        let status = self.git.call(&["submodule", "status"]).await;
        if !status.is_ok() {
            return Err(self.failed(format!(
                "Broken submodules configuration detected for {}\n{}",
                self.src, status.output
            )));
        }
        if status.output.trim().is_empty() {
            return Ok(());
        }
        let update = self
            .git
            .call(&["submodule", "update", "--init", "--recursive"])
            .await;
        if !update.is_ok() {
            return Err(self.failed(format!("Failed to update submodules\n{}", update.output)));
        }
        Ok(())
    }

    async fn ensure_on_branch(&self, branch: &Branch) -> Step<()> {
        let current = self
            .git
            .current_branch()
            .await
            .ok_or_else(|| self.skipped("Not on any branch"))?;
        if current == branch.name {
            return Ok(());
        }
        if !self.correct_branch {
            return Err(self.skipped(format!(
                "Not on the correct branch. On {} but should be on {}",
                current, branch.name
            )));
        }

        info!("{}: switching from {} to {}", self.src, current, branch.name);
        let stashed = self.stash_if_dirty().await?;
        let checkout = self.git.call(&["checkout", &branch.name]).await;
        if !checkout.is_ok() {
            let mut message = format!("Checkout failed\n{}", checkout.output);
            // 変更は元のブランチに残る
            if stashed {
                if let Err(pop) = self.stash_pop().await {
                    message.push_str("\n\n");
                    message.push_str(&pop.message);
                }
            }
            return Err(self.failed(message));
        }
        if stashed {
            self.stash_pop().await?;
        }
        Ok(())
    }

    async fn fetch(&self, remote: &str) -> Step<()> {
        let fetch = self.git.call(&["fetch", remote]).await;
        if fetch.is_ok() {
            Ok(())
        } else {
            Err(self.failed(format!("Fetch failed\n{}", fetch.output)))
        }
    }

    async fn stash_if_dirty(&self) -> Step<bool> {
        if self.git.is_clean().await {
            return Ok(false);
        }
        let stash = self.git.call(&["stash"]).await;
        if !stash.is_ok() {
            return Err(self.failed(format!("Stashing changes failed\n{}", stash.output)));
        }
        Ok(true)
    }

    async fn stash_pop(&self) -> Step<()> {
        let pop = self.git.call(&["stash", "pop"]).await;
        if pop.is_ok() {
            Ok(())
        } else {
            Err(self.failed(format!("Stashing back changes failed\n{}", pop.output)))
        }
    }

    async fn rebase(&self, remote_ref: &str, stashed: bool) -> Step<SyncOutcome> {
        let rebase = self.git.call(&["rebase", remote_ref]).await;
        if rebase.is_ok() {
            // popに失敗してもリベースは戻さない
            if stashed {
                self.stash_pop().await?;
            }
            return Ok(self.ok(""));
        }

        let mut message = format!("Rebase failed with following output\n\n{}", rebase.output);
        let abort = self.git.call(&["rebase", "--abort"]).await;
        if !abort.is_ok() {
            warn!("{}: git rebase --abort failed", self.src);
            message.push_str("\n\nAdditionally, git rebase --abort failed with following output:\n\n");
            message.push_str(&abort.output);
            return Err(self.failed(message));
        }
        if stashed {
            if let Err(pop) = self.stash_pop().await {
                message.push_str("\n\n");
                message.push_str(&pop.message);
            }
        }
        Err(self.failed(message))
    }

    /// 固定refのリポジトリはrebaseせず、クリーンな場合のみreset --hardする
    async fn reset_to_ref(&self, project: &GitProject, fixed_ref: &str) -> Step<SyncOutcome> {
        let remote = project
            .default_remote()
            .map(|r| r.name.clone())
            .ok_or_else(|| self.skipped("No remote configured"))?;
        self.fetch(&remote).await?;
        if !self.git.is_clean().await {
            return Err(self.skipped("Skipped: worktree is not clean"));
        }
        let reset = self.git.call(&["reset", "--hard", fixed_ref]).await;
        if !reset.is_ok() {
            return Err(self.failed(format!("Reset to {} failed\n{}", fixed_ref, reset.output)));
        }
        Ok(self.ok(format!("reset to {}", fixed_ref)))
    }

    fn ok(&self, message: impl Into<String>) -> SyncOutcome {
        SyncOutcome::ok(self.src.clone(), message)
    }

    fn skipped(&self, message: impl Into<String>) -> SyncOutcome {
        SyncOutcome::skipped(self.src.clone(), message)
    }

    fn failed(&self, message: impl Into<String>) -> SyncOutcome {
        SyncOutcome::failed(self.src.clone(), message)
    }
}
