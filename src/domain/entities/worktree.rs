use super::repository::{Branch, HasRemotes, HasSrc, Remote, RepoSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// ワークツリーの設定（`.qi/config.yml`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeConfig {
    /// マニフェストリポジトリのURL
    pub url: String,

    /// マニフェストのブランチ
    #[serde(default = "default_manifest_branch")]
    pub branch: String,

    /// 使用するグループ（常にソート済み）
    ///
    /// Noneは一度も指定されていない状態で、マニフェストのデフォルトグループを使う。
    /// 空のリストはすべてのグループが外された状態で、リポジトリを使わない。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,

    /// マニフェストの固定ref
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub fixed_ref: Option<String>,

    /// コードレビューを使用するか
    #[serde(default = "default_review")]
    pub review: bool,

    /// グループを無視して全リポジトリを使用するか
    #[serde(default)]
    pub all_repos: bool,

    /// ホストごとのsshユーザー名
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub usernames: HashMap<String, String>,
}

fn default_manifest_branch() -> String {
    "master".to_string()
}

fn default_review() -> bool {
    true
}

impl WorktreeConfig {
    /// 新しいWorktreeConfigインスタンスを作成
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            branch: default_manifest_branch(),
            groups: None,
            fixed_ref: None,
            review: true,
            all_repos: false,
            usernames: HashMap::new(),
        }
    }

    /// ブランチを設定
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// グループを設定（空ならデフォルトグループを使う）
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        if !groups.is_empty() {
            self.set_groups(groups);
        }
        self
    }

    /// 全リポジトリ使用を設定
    pub fn with_all_repos(mut self, all_repos: bool) -> Self {
        self.all_repos = all_repos;
        self
    }

    /// グループを置き換える（ソートと重複排除を行う）
    pub fn set_groups(&mut self, mut groups: Vec<String>) {
        groups.sort();
        groups.dedup();
        self.groups = Some(groups);
    }

    /// グループを追加する
    pub fn add_group(&mut self, group: impl Into<String>) {
        let mut groups = self.groups.clone().unwrap_or_default();
        groups.push(group.into());
        self.set_groups(groups);
    }

    /// グループを削除する（最後のグループを外しても空のリストとして残る）
    pub fn remove_group(&mut self, group: &str) {
        if let Some(groups) = &mut self.groups {
            groups.retain(|g| g != group);
        }
    }

    /// グループが一度でも指定されたか
    pub fn has_groups(&self) -> bool {
        self.groups.is_some()
    }

    /// 指定されたグループ（未指定なら空）
    pub fn configured_groups(&self) -> &[String] {
        self.groups.as_deref().unwrap_or(&[])
    }

    /// グループ指定（未指定ならNone）
    pub fn requested_groups(&self) -> Option<&[String]> {
        self.groups.as_deref()
    }
}

/// ローカルキャッシュ（git.xml）に記録されたプロジェクト
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitProject {
    /// ワークツリー内での相対パス
    pub src: String,
    /// 設定済みのリモート
    pub remotes: Vec<Remote>,
    /// 設定済みのブランチ
    pub branches: Vec<Branch>,
    /// 固定ref
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_ref: Option<String>,
}

impl GitProject {
    /// 新しいGitProjectインスタンスを作成
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            remotes: Vec::new(),
            branches: Vec::new(),
            fixed_ref: None,
        }
    }

    /// マニフェストのリポジトリ定義からプロジェクトを作る
    pub fn from_repo(repo: &RepoSpec) -> Self {
        let mut project = Self::new(repo.src.clone());
        project.apply_repo_config(repo);
        project
    }

    /// リポジトリ定義の設定を反映する
    pub fn apply_repo_config(&mut self, repo: &RepoSpec) {
        self.remotes = repo.remotes.clone();
        self.fixed_ref = repo.fixed_ref.clone();
        self.branches.iter_mut().for_each(|b| b.default = false);
        if let Some(branch) = repo.tracking_branch() {
            match self.branches.iter_mut().find(|b| b.name == branch.name) {
                Some(existing) => *existing = branch,
                None => self.branches.push(branch),
            }
        }
    }

    /// デフォルトブランチ
    pub fn default_branch(&self) -> Option<&Branch> {
        self.branches.iter().find(|b| b.default)
    }

    /// 過去のマニフェスト状態としてのRepoSpec
    ///
    /// プロジェクト名はデフォルトリモートのURLから推測する。
    pub fn to_repo_spec(&self) -> RepoSpec {
        let project = self
            .default_remote()
            .map(|r| crate::domain::value_objects::remote_url::name_from_url(&r.url))
            .unwrap_or_else(|| self.src.clone());
        let mut repo = RepoSpec::new(project).with_src(self.src.clone());
        for remote in &self.remotes {
            repo = repo.with_remote(remote.clone());
        }
        if let Some(fixed_ref) = &self.fixed_ref {
            repo = repo.with_fixed_ref(fixed_ref.clone());
        } else if let Some(branch) = self.default_branch() {
            repo = repo.with_default_branch(branch.name.clone());
        }
        repo
    }
}

impl HasSrc for GitProject {
    fn src(&self) -> &str {
        &self.src
    }
}

impl HasRemotes for GitProject {
    fn remotes(&self) -> &[Remote] {
        &self.remotes
    }
}

/// 同期開始時にディスクから読み直したリポジトリの状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRepoState {
    /// キャッシュ上のプロジェクト
    pub project: GitProject,
    /// 現在のブランチ（detached HEADならNone）
    pub current_branch: Option<String>,
    /// 作業ツリーがクリーンか
    pub clean: bool,
    /// 追跡ブランチより進んでいるコミット数
    pub ahead: usize,
    /// 追跡ブランチより遅れているコミット数
    pub behind: usize,
}

impl LocalRepoState {
    /// 未取得状態で作成
    pub fn new(project: GitProject) -> Self {
        Self {
            project,
            current_branch: None,
            clean: true,
            ahead: 0,
            behind: 0,
        }
    }

    /// 正しいブランチ上にいるか
    pub fn on_default_branch(&self) -> bool {
        match (self.project.default_branch(), &self.current_branch) {
            (Some(branch), Some(current)) => &branch.name == current,
            _ => false,
        }
    }
}

impl HasSrc for LocalRepoState {
    fn src(&self) -> &str {
        &self.project.src
    }
}
