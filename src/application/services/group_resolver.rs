use std::collections::HashSet;
use tracing::debug;

use crate::common::result::WtreeResult;
use crate::domain::entities::group::GroupError;
use crate::domain::entities::manifest::Manifest;
use crate::domain::entities::repository::RepoSpec;

/// マニフェストのグループから対象リポジトリを決めるサービス
pub struct GroupResolver<'a> {
    manifest: &'a Manifest,
}

impl<'a> GroupResolver<'a> {
    /// 新しいGroupResolverインスタンスを作成
    pub fn new(manifest: &'a Manifest) -> Self {
        Self { manifest }
    }

    /// グループに含まれるプロジェクト名（入れ子を展開、重複なし）
    pub fn projects_in_group(&self, group: &str) -> Result<Vec<String>, GroupError> {
        let mut projects = Vec::new();
        let mut seen_groups = HashSet::new();
        self.collect(group, &mut seen_groups, &mut projects)?;
        Ok(projects)
    }

    fn collect(
        &self,
        name: &str,
        seen_groups: &mut HashSet<String>,
        projects: &mut Vec<String>,
    ) -> Result<(), GroupError> {
        // 入れ子の循環は一度だけ展開する
        if !seen_groups.insert(name.to_string()) {
            return Ok(());
        }
        let group = self
            .manifest
            .groups
            .get(name)
            .ok_or_else(|| GroupError::NoSuchGroup(name.to_string()))?;

        for project in &group.projects {
            if self.manifest.find_repo(project).is_none() {
                return Err(GroupError::NoSuchProject {
                    group: name.to_string(),
                    project: project.clone(),
                });
            }
            if !projects.contains(project) {
                projects.push(project.clone());
            }
        }
        for subgroup in &group.subgroups {
            self.collect(subgroup, seen_groups, projects)?;
        }
        Ok(())
    }

    /// 同期対象のリポジトリ（マニフェストの宣言順）
    ///
    /// グループ指定がなければ`default`グループを使う。
    /// `all_repos`の場合とデフォルトグループがない場合は全リポジトリ。
    pub fn resolve(&self, groups: Option<&[String]>, all_repos: bool) -> WtreeResult<Vec<RepoSpec>> {
        if all_repos {
            return Ok(self.manifest.repos.clone());
        }

        let group_names: Vec<String> = match groups {
            Some(groups) => groups.to_vec(),
            None => match self.manifest.groups.default_group() {
                Some(group) => vec![group.name.clone()],
                None => return Ok(self.manifest.repos.clone()),
            },
        };
        debug!("Resolving groups {:?}", group_names);

        let mut wanted = HashSet::new();
        for name in &group_names {
            wanted.extend(self.projects_in_group(name)?);
        }
        Ok(self
            .manifest
            .repos
            .iter()
            .filter(|repo| wanted.contains(&repo.project))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::group::{Group, Groups};
    use crate::domain::entities::manifest::{RemoteDecl, RepoDecl};
    use crate::domain::value_objects::remote_url::StaticUsernames;
    use pretty_assertions::assert_eq;

    fn manifest(groups: Groups) -> Manifest {
        Manifest::from_declarations(
            vec![RemoteDecl::new("origin", "git://example.com")],
            vec![
                RepoDecl::new("a.git", &["origin"]),
                RepoDecl::new("b.git", &["origin"]),
                RepoDecl::new("c.git", &["origin"]),
            ],
            groups,
            None,
            &StaticUsernames::default(),
        )
        .unwrap()
    }

    fn srcs(repos: Vec<RepoSpec>) -> Vec<String> {
        repos.into_iter().map(|r| r.src).collect()
    }

    fn default_and_extra() -> Groups {
        let mut groups = Groups::new();
        groups.add(
            Group::new("default")
                .with_default(true)
                .with_project("a.git")
                .with_project("b.git"),
        );
        groups.add(Group::new("extra").with_project("c.git"));
        groups
    }

    #[test]
    fn test_default_group_used_implicitly() {
        let manifest = manifest(default_and_extra());
        let resolver = GroupResolver::new(&manifest);

        assert_eq!(srcs(resolver.resolve(None, false).unwrap()), vec!["a", "b"]);
        assert_eq!(
            srcs(resolver.resolve(None, true).unwrap()),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_explicit_groups() {
        let manifest = manifest(default_and_extra());
        let resolver = GroupResolver::new(&manifest);
        let groups = vec!["extra".to_string()];

        assert_eq!(srcs(resolver.resolve(Some(groups.as_slice()), false).unwrap()), vec!["c"]);
    }

    #[test]
    fn test_no_groups_means_all_repos() {
        let manifest = manifest(Groups::new());
        let resolver = GroupResolver::new(&manifest);
        assert_eq!(srcs(resolver.resolve(None, false).unwrap()).len(), 3);
    }

    #[test]
    fn test_nested_groups_are_flattened() {
        let mut groups = Groups::new();
        groups.add(Group::new("base").with_project("a.git").with_subgroup("top"));
        groups.add(
            Group::new("top")
                .with_project("b.git")
                .with_project("a.git")
                .with_subgroup("base"),
        );
        let manifest = manifest(groups);
        let resolver = GroupResolver::new(&manifest);

        assert_eq!(
            resolver.projects_in_group("top").unwrap(),
            vec!["b.git", "a.git"]
        );
    }

    #[test]
    fn test_unknown_group_and_project() {
        let mut groups = Groups::new();
        groups.add(Group::new("broken").with_project("nope.git"));
        let manifest = manifest(groups);
        let resolver = GroupResolver::new(&manifest);

        assert_eq!(
            resolver.projects_in_group("missing").unwrap_err(),
            GroupError::NoSuchGroup("missing".to_string())
        );
        let err = resolver.projects_in_group("broken").unwrap_err();
        assert_eq!(err.to_string(), "When reading group broken:\nNo such project: nope.git");
    }
}
