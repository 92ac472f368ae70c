use serde::{Deserialize, Serialize};
use thiserror::Error;

/// グループ解決のエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GroupError {
    #[error("No such group: {0}")]
    NoSuchGroup(String),

    #[error("When reading group {group}:\nNo such project: {project}")]
    NoSuchProject { group: String, project: String },
}

/// プロジェクトのグループ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// グループ名
    pub name: String,
    /// デフォルトのグループか
    #[serde(default)]
    pub default: bool,
    /// 直接含まれるプロジェクト名
    #[serde(default)]
    pub projects: Vec<String>,
    /// 入れ子になったグループ名
    #[serde(default)]
    pub subgroups: Vec<String>,
}

impl Group {
    /// 新しいGroupインスタンスを作成
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: false,
            projects: Vec::new(),
            subgroups: Vec::new(),
        }
    }

    /// デフォルトフラグを設定
    pub fn with_default(mut self, default: bool) -> Self {
        self.default = default;
        self
    }

    /// プロジェクトを追加
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.projects.push(project.into());
        self
    }

    /// 入れ子のグループを追加
    pub fn with_subgroup(mut self, group: impl Into<String>) -> Self {
        self.subgroups.push(group.into());
        self
    }
}

/// マニフェストで宣言されたグループの集合
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Groups {
    groups: Vec<Group>,
}

impl Groups {
    pub fn new() -> Self {
        Self::default()
    }

    /// グループを追加（同名のグループは置き換える）
    pub fn add(&mut self, group: Group) {
        self.groups.retain(|g| g.name != group.name);
        self.groups.push(group);
    }

    pub fn get(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }

    /// `default`属性を持つグループ
    pub fn default_group(&self) -> Option<&Group> {
        self.groups.iter().find(|g| g.default)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_replace_same_name() {
        let mut groups = Groups::new();
        groups.add(Group::new("mygroup").with_project("a"));
        groups.add(Group::new("mygroup").with_project("b"));

        assert_eq!(groups.names(), vec!["mygroup"]);
        assert_eq!(groups.get("mygroup").unwrap().projects, vec!["b"]);
    }

    #[test]
    fn test_default_group() {
        let mut groups = Groups::new();
        groups.add(Group::new("extra").with_project("c"));
        assert!(groups.default_group().is_none());

        groups.add(Group::new("default").with_default(true).with_project("a"));
        assert_eq!(groups.default_group().unwrap().name, "default");
    }

    #[test]
    fn test_group_error_messages() {
        let err = GroupError::NoSuchProject {
            group: "foo".to_string(),
            project: "bar.git".to_string(),
        };
        assert_eq!(err.to_string(), "When reading group foo:\nNo such project: bar.git");
    }
}
