use crate::domain::entities::repository::{find_common_url, RepoSpec};
use serde::Serialize;

/// srcが変わったリポジトリ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoMove {
    /// ディスク上の現在の定義
    pub old: RepoSpec,
    /// マニフェストの新しい定義
    pub new: RepoSpec,
}

impl RepoMove {
    pub fn new_src(&self) -> &str {
        &self.new.src
    }
}

/// 同じsrcのまま設定が変わったリポジトリ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoUpdate {
    pub old: RepoSpec,
    pub new: RepoSpec,
}

/// 宣言とディスク上の状態の差分
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepoDiff {
    /// 追加するリポジトリ（src順）
    pub to_add: Vec<RepoSpec>,
    /// 移動するリポジトリ（旧src順）
    pub to_move: Vec<RepoMove>,
    /// 削除するリポジトリ（src順）
    pub to_remove: Vec<RepoSpec>,
    /// 設定を更新するリポジトリ（旧src順）
    pub to_update: Vec<RepoUpdate>,
}

impl RepoDiff {
    /// 何もすることがないか
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty()
            && self.to_move.is_empty()
            && self.to_remove.is_empty()
            && self.to_update.is_empty()
    }
}

/// 差分を計算する
///
/// リポジトリの対応付けはsrcではなく共通のリモートURLで行う。
/// srcが同じでリモートが変わったリポジトリは追加と削除ではなく更新になる。
pub fn compute_diff(old_repos: &[RepoSpec], new_repos: &[RepoSpec]) -> RepoDiff {
    let mut diff = RepoDiff::default();
    let mut candidates_to_add = Vec::new();

    for new_repo in new_repos {
        match old_repos
            .iter()
            .find(|old_repo| find_common_url(*old_repo, new_repo).is_some())
        {
            Some(old_repo) => {
                if old_repo.src != new_repo.src {
                    diff.to_move.push(RepoMove {
                        old: old_repo.clone(),
                        new: new_repo.clone(),
                    });
                }
            }
            None => candidates_to_add.push(new_repo.clone()),
        }
    }

    for old_repo in old_repos {
        match new_repos.iter().find(|new_repo| new_repo.src == old_repo.src) {
            Some(new_repo) => {
                if !new_repo.same_config(old_repo) {
                    diff.to_update.push(RepoUpdate {
                        old: old_repo.clone(),
                        new: new_repo.clone(),
                    });
                }
            }
            None => {
                let moved = diff.to_move.iter().any(|m| m.old == *old_repo);
                if !moved {
                    diff.to_remove.push(old_repo.clone());
                }
            }
        }
    }

    diff.to_add = candidates_to_add
        .into_iter()
        .filter(|repo| !diff.to_update.iter().any(|u| u.old.src == repo.src))
        .collect();

    diff.to_add.sort_by(|a, b| a.src.cmp(&b.src));
    diff.to_remove.sort_by(|a, b| a.src.cmp(&b.src));
    diff.to_move.sort_by(|a, b| a.old.src.cmp(&b.old.src));
    diff.to_update.sort_by(|a, b| a.old.src.cmp(&b.old.src));
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::repository::Remote;
    use pretty_assertions::assert_eq;

    fn make_repo(project: &str, src: &str, remotes: &[&str], branch: &str) -> RepoSpec {
        let mut repo = RepoSpec::new(project).with_src(src).with_default_branch(branch);
        for name in remotes {
            let remote = Remote::new(*name, format!("git://{}/{}", name, project))
                .with_review(*name == "gerrit");
            repo = repo.with_remote(remote);
        }
        repo
    }

    fn make_repos(specs: &[(&str, &str, &[&str])]) -> Vec<RepoSpec> {
        specs
            .iter()
            .map(|(project, src, remotes)| make_repo(project, src, remotes, "master"))
            .collect()
    }

    #[test]
    fn test_no_diff() {
        let old = make_repos(&[("foo.git", "foo", &["origin"]), ("bar.git", "bar", &["origin"])]);
        let diff = compute_diff(&old, &old.clone());
        assert!(diff.is_empty());
    }

    #[test]
    fn test_adding_a_remote_is_an_update() {
        let old = make_repos(&[("foo.git", "foo", &["origin"])]);
        let new = make_repos(&[("foo.git", "foo", &["origin", "gerrit"])]);
        let diff = compute_diff(&old, &new);

        assert!(diff.to_add.is_empty());
        assert!(diff.to_move.is_empty());
        assert!(diff.to_remove.is_empty());
        assert_eq!(diff.to_update.len(), 1);
    }

    #[test]
    fn test_change_branch() {
        let old = vec![
            make_repo("foo.git", "foo", &["origin"], "master"),
            make_repo("bar.git", "bar", &["origin"], "master"),
        ];
        let new = vec![
            make_repo("foo.git", "foo", &["origin"], "devel"),
            make_repo("bar.git", "bar", &["origin"], "master"),
        ];
        let diff = compute_diff(&old, &new);

        assert_eq!(diff.to_update.len(), 1);
        let update = &diff.to_update[0];
        assert_eq!(update.old.default_branch.as_deref(), Some("master"));
        assert_eq!(update.new.default_branch.as_deref(), Some("devel"));
        assert!(diff.to_add.is_empty() && diff.to_remove.is_empty() && diff.to_move.is_empty());
    }

    #[test]
    fn test_moving() {
        let old = make_repos(&[("foo.git", "foo", &["origin"]), ("bar.git", "bar", &["origin", "gerrit"])]);
        let new = make_repos(&[("bar.git", "bar", &["origin", "gerrit"]), ("foo.git", "lib/foo", &["origin"])]);
        let diff = compute_diff(&old, &new);

        assert!(diff.to_add.is_empty());
        assert_eq!(diff.to_move.len(), 1);
        assert_eq!(diff.to_move[0].old.project, "foo.git");
        assert_eq!(diff.to_move[0].new_src(), "lib/foo");
        assert!(diff.to_remove.is_empty());
        assert!(diff.to_update.is_empty());
    }

    #[test]
    fn test_single_move_with_plain_url() {
        let old = vec![RepoSpec::new("a.git").with_src("a").with_remote(Remote::new("origin", "u"))];
        let new = vec![RepoSpec::new("a.git").with_src("lib/a").with_remote(Remote::new("origin", "u"))];
        let diff = compute_diff(&old, &new);

        assert_eq!(diff.to_move.len(), 1);
        assert_eq!(diff.to_move[0].old.src, "a");
        assert_eq!(diff.to_move[0].new_src(), "lib/a");
        assert!(diff.to_add.is_empty());
        assert!(diff.to_remove.is_empty());
        assert!(diff.to_update.is_empty());
    }

    #[test]
    fn test_rm_add_never_merged_into_move() {
        let old = make_repos(&[("foo.git", "foo", &["origin"]), ("bar.git", "bar", &["origin"])]);
        let new = make_repos(&[("foo.git", "foo", &["origin"]), ("spam.git", "spam", &["origin"])]);
        let diff = compute_diff(&old, &new);

        assert_eq!(diff.to_add.len(), 1);
        assert_eq!(diff.to_add[0].project, "spam.git");
        assert_eq!(diff.to_remove.len(), 1);
        assert_eq!(diff.to_remove[0].project, "bar.git");
        assert!(diff.to_move.is_empty());
        assert!(diff.to_update.is_empty());
    }

    #[test]
    fn test_changing_remote_url_is_an_update() {
        let old = make_repos(&[("git/foo.git", "foo", &["origin"]), ("bar.git", "bar", &["origin"])]);
        let new = make_repos(&[("gerrit/foo.git", "foo", &["origin"]), ("bar.git", "bar", &["origin"])]);
        let diff = compute_diff(&old, &new);

        assert!(diff.to_add.is_empty());
        assert!(diff.to_remove.is_empty());
        assert!(diff.to_move.is_empty());
        assert_eq!(
            diff.to_update,
            vec![RepoUpdate {
                old: old[0].clone(),
                new: new[0].clone()
            }]
        );
    }

    #[test]
    fn test_nested_sources_added_parent_first() {
        let new = make_repos(&[("foo/bar.git", "foo/bar", &["origin"]), ("foo.git", "foo", &["origin"])]);
        let diff = compute_diff(&[], &new);

        let srcs: Vec<&str> = diff.to_add.iter().map(|r| r.src.as_str()).collect();
        assert_eq!(srcs, vec!["foo", "foo/bar"]);
    }
}
