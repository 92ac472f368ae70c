use super::group::Groups;
use super::repository::{HasRemotes, Remote, RepoSpec};
use crate::common::error::WtreeError;
use crate::common::result::WtreeResult;
use crate::domain::value_objects::remote_url::{RemoteUrl, RemoteUrlError, UsernameLookup};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// マニフェストの`<remote>`宣言
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDecl {
    /// リモート名
    pub name: String,
    /// URL（プロジェクト名を連結するプレフィックス）
    pub url: String,
    /// レビュー用か
    #[serde(default)]
    pub review: bool,
    /// デフォルトブランチ
    #[serde(default)]
    pub default_branch: Option<String>,
}

impl RemoteDecl {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            review: false,
            default_branch: None,
        }
    }

    pub fn with_review(mut self, review: bool) -> Self {
        self.review = review;
        self
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = Some(branch.into());
        self
    }
}

/// マニフェストの`<repo>`宣言
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoDecl {
    /// プロジェクト名
    pub project: String,
    /// 相対パス（省略時はプロジェクト名から計算）
    pub src: Option<String>,
    /// branch属性
    pub branch: Option<String>,
    /// ref属性
    pub fixed_ref: Option<String>,
    /// remotes属性（空白区切り）
    pub remote_names: Vec<String>,
    /// default_remote属性
    pub default_remote: Option<String>,
    /// `<upstream>`で宣言された追加リモート
    pub upstreams: Vec<(String, String)>,
}

impl RepoDecl {
    pub fn new(project: impl Into<String>, remotes: &[&str]) -> Self {
        Self {
            project: project.into(),
            remote_names: remotes.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_fixed_ref(mut self, fixed_ref: impl Into<String>) -> Self {
        self.fixed_ref = Some(fixed_ref.into());
        self
    }
}

/// 検証済みのマニフェスト
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// 宣言されたリモートと、その分類済みURL
    pub remotes: Vec<(RemoteDecl, RemoteUrl)>,
    /// 宣言順のリポジトリ
    pub repos: Vec<RepoSpec>,
    /// グループ
    pub groups: Groups,
    /// `<branch default>`で宣言されたデフォルトブランチ
    pub default_branch: Option<String>,
}

impl Manifest {
    /// 宣言からマニフェストを組み立てて検証する
    ///
    /// 検証エラーは副作用の前に返される。
    pub fn from_declarations(
        remote_decls: Vec<RemoteDecl>,
        repo_decls: Vec<RepoDecl>,
        groups: Groups,
        default_branch: Option<String>,
        usernames: &dyn UsernameLookup,
    ) -> WtreeResult<Self> {
        let mut remotes = Vec::with_capacity(remote_decls.len());
        for decl in remote_decls {
            let location = RemoteUrl::parse(&decl.url, usernames).map_err(|e| match e {
                RemoteUrlError::MissingUsername { .. } => {
                    WtreeError::config_error_with_source("Could not resolve remote", e)
                }
                other => WtreeError::validation_error(format!(
                    "Invalid url for remote {}: {}",
                    decl.name, other
                )),
            })?;
            remotes.push((decl, location));
        }

        let review_count = remotes.iter().filter(|(decl, _)| decl.review).count();
        if review_count > 1 {
            return Err(WtreeError::validation_error(
                "Only one remote can be configured with review=\"true\"",
            ));
        }

        let mut manifest = Self {
            remotes,
            repos: Vec::new(),
            groups,
            default_branch,
        };

        let mut seen_projects = HashSet::new();
        let mut seen_srcs: HashMap<String, String> = HashMap::new();
        for decl in repo_decls {
            if !seen_projects.insert(decl.project.clone()) {
                return Err(WtreeError::validation_error(format!(
                    "{} found twice",
                    decl.project
                )));
            }
            let repo = manifest.build_repo(decl)?;
            if let Some(other) = seen_srcs.insert(repo.src.clone(), repo.project.clone()) {
                return Err(WtreeError::validation_error(format!(
                    "Found two projects sharing the same sources:\n{}\n{}",
                    other, repo.project
                )));
            }
            manifest.repos.push(repo);
        }

        Ok(manifest)
    }

    fn build_repo(&self, decl: RepoDecl) -> WtreeResult<RepoSpec> {
        if decl.branch.is_some() && decl.fixed_ref.is_some() {
            return Err(WtreeError::validation_error(format!(
                "Error when parsing repo {}: 'branch' and 'ref' are mutually exclusive",
                decl.project
            )));
        }
        if decl.remote_names.is_empty() {
            return Err(WtreeError::validation_error(format!(
                "Error when parsing repo {}: missing 'remotes' attribute",
                decl.project
            )));
        }

        let default_remote = decl
            .default_remote
            .clone()
            .unwrap_or_else(|| decl.remote_names[0].clone());

        let mut repo = RepoSpec::new(decl.project.clone());
        if let Some(src) = &decl.src {
            repo = repo.with_src(src.clone());
        }

        let mut remote_default_branch = None;
        for name in &decl.remote_names {
            let (remote_decl, location) = self.find_remote(name).ok_or_else(|| {
                WtreeError::validation_error(format!(
                    "No matching remote: {} for repo {}",
                    name, decl.project
                ))
            })?;
            let is_default = *name == default_remote;
            if is_default {
                remote_default_branch = remote_decl.default_branch.clone();
            }
            let mut remote = Remote::new(name.clone(), format!("{}{}", location.prefix, decl.project))
                .with_review(remote_decl.review)
                .with_default(is_default);
            remote.default_branch = remote_decl.default_branch.clone();
            repo = repo.with_remote(remote);
        }
        for (name, url) in &decl.upstreams {
            repo = repo.with_remote(Remote::new(name.clone(), url.clone()));
        }

        if repo.default_remote().map(|r| r.name.as_str()) != Some(default_remote.as_str()) {
            return Err(WtreeError::validation_error(format!(
                "No matching remote: {} for repo {}",
                default_remote, decl.project
            )));
        }

        match decl.fixed_ref {
            Some(fixed_ref) => repo = repo.with_fixed_ref(fixed_ref),
            None => {
                if let Some(branch) = decl
                    .branch
                    .or_else(|| self.default_branch.clone())
                    .or(remote_default_branch)
                {
                    repo = repo.with_default_branch(branch);
                }
            }
        }
        Ok(repo)
    }

    fn find_remote(&self, name: &str) -> Option<&(RemoteDecl, RemoteUrl)> {
        self.remotes.iter().find(|(decl, _)| decl.name == name)
    }

    /// プロジェクト名でリポジトリを探す
    pub fn find_repo(&self, project: &str) -> Option<&RepoSpec> {
        self.repos.iter().find(|r| r.project == project)
    }

    /// srcでリポジトリを探す
    pub fn find_repo_by_src(&self, src: &str) -> Option<&RepoSpec> {
        self.repos.iter().find(|r| r.src == src)
    }
}
