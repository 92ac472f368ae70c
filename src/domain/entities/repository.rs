use serde::{Deserialize, Serialize};

/// srcパスを持つもの
pub trait HasSrc {
    /// ワークツリールートからの相対パス
    fn src(&self) -> &str;
}

/// gitリモートを持つもの
pub trait HasRemotes {
    /// 設定されたリモートのリスト
    fn remotes(&self) -> &[Remote];

    /// 全リモートのURL
    fn remote_urls(&self) -> Vec<&str> {
        self.remotes().iter().map(|r| r.url.as_str()).collect()
    }

    /// 名前でリモートを探す
    fn find_remote(&self, name: &str) -> Option<&Remote> {
        self.remotes().iter().find(|r| r.name == name)
    }

    /// デフォルトのリモート（なければ最初のリモート）
    fn default_remote(&self) -> Option<&Remote> {
        self.remotes()
            .iter()
            .find(|r| r.default)
            .or_else(|| self.remotes().first())
    }

    /// レビュー用のリモート
    fn review_remote(&self) -> Option<&Remote> {
        self.remotes().iter().find(|r| r.review)
    }
}

/// 2つのリポジトリが共有するリモートURL
pub fn find_common_url<'a, A: HasRemotes, B: HasRemotes>(a: &'a A, b: &B) -> Option<&'a str> {
    let others = b.remote_urls();
    a.remote_urls().into_iter().find(|url| others.contains(url))
}

/// リモートリポジトリの情報
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Remote {
    /// リモート名（例: origin）
    pub name: String,
    /// リモートのURL
    pub url: String,
    /// コードレビュー用のリモートか
    #[serde(default)]
    pub review: bool,
    /// デフォルトのリモートか
    #[serde(default)]
    pub default: bool,
    /// このリモートのデフォルトブランチ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
}

impl Remote {
    /// 新しいRemoteインスタンスを作成
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            review: false,
            default: false,
            default_branch: None,
        }
    }

    /// レビューフラグを設定
    pub fn with_review(mut self, review: bool) -> Self {
        self.review = review;
        self
    }

    /// デフォルトフラグを設定
    pub fn with_default(mut self, default: bool) -> Self {
        self.default = default;
        self
    }
}

// 比較に使うのはgitの設定だけ
impl PartialEq for Remote {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.url == other.url && self.review == other.review
    }
}

impl Eq for Remote {}

/// ローカルブランチの設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// ブランチ名
    pub name: String,
    /// 追跡するリモート名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracks: Option<String>,
    /// 追跡するリモートブランチ名（省略時はnameと同じ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_branch: Option<String>,
    /// デフォルトブランチか
    #[serde(default)]
    pub default: bool,
}

impl Branch {
    /// 新しいBranchインスタンスを作成
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tracks: None,
            remote_branch: None,
            default: false,
        }
    }

    /// 追跡するリモートを設定
    pub fn tracking(mut self, remote: impl Into<String>) -> Self {
        self.tracks = Some(remote.into());
        self
    }

    /// 追跡先のリモートブランチ名
    pub fn remote_branch_name(&self) -> &str {
        self.remote_branch.as_deref().unwrap_or(&self.name)
    }

    /// `remote/branch`形式の追跡先
    pub fn remote_ref(&self) -> Option<String> {
        self.tracks
            .as_ref()
            .map(|remote| format!("{}/{}", remote, self.remote_branch_name()))
    }
}

/// マニフェストで宣言されたリポジトリ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSpec {
    /// プロジェクト名（例: lib/foo.git）
    pub project: String,
    /// ワークツリー内での相対パス
    pub src: String,
    /// リモートのリスト（URLはプレフィックスとプロジェクト名から計算済み）
    pub remotes: Vec<Remote>,
    /// デフォルトブランチ（fixed_refと排他）
    pub default_branch: Option<String>,
    /// 固定されたref
    pub fixed_ref: Option<String>,
    /// コードレビューを使用するか
    pub review: bool,
}

impl RepoSpec {
    /// 新しいRepoSpecインスタンスを作成
    ///
    /// srcは末尾の`.git`を除いたプロジェクト名になる。
    pub fn new(project: impl Into<String>) -> Self {
        let project = project.into();
        let src = default_src(&project);
        Self {
            project,
            src,
            remotes: Vec::new(),
            default_branch: None,
            fixed_ref: None,
            review: false,
        }
    }

    /// srcを設定
    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = src.into();
        self
    }

    /// リモートを追加
    pub fn with_remote(mut self, remote: Remote) -> Self {
        self.review |= remote.review;
        self.remotes.push(remote);
        self
    }

    /// デフォルトブランチを設定
    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = Some(branch.into());
        self
    }

    /// 固定refを設定（デフォルトブランチは解除される）
    pub fn with_fixed_ref(mut self, fixed_ref: impl Into<String>) -> Self {
        self.fixed_ref = Some(fixed_ref.into());
        self.default_branch = None;
        self
    }

    /// クローンに使うURL（デフォルトリモートのURL）
    pub fn clone_url(&self) -> Option<&str> {
        self.default_remote().map(|r| r.url.as_str())
    }

    /// デフォルトブランチの追跡設定
    pub fn tracking_branch(&self) -> Option<Branch> {
        let name = self.default_branch.as_ref()?;
        let mut branch = Branch::new(name.clone());
        branch.tracks = self.default_remote().map(|r| r.name.clone());
        branch.default = true;
        Some(branch)
    }

    /// 差分計算で比較されるgit設定が等しいか
    pub fn same_config(&self, other: &RepoSpec) -> bool {
        self.remotes == other.remotes
            && self.default_branch == other.default_branch
            && self.fixed_ref == other.fixed_ref
    }
}

impl HasSrc for RepoSpec {
    fn src(&self) -> &str {
        &self.src
    }
}

impl HasRemotes for RepoSpec {
    fn remotes(&self) -> &[Remote] {
        &self.remotes
    }
}

fn default_src(project: &str) -> String {
    project.strip_suffix(".git").unwrap_or(project).to_string()
}
