use super::worktree::WorktreeConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 現在書き出すスナップショットの形式
pub const SNAPSHOT_FORMAT: u32 = 2;

/// スナップショットに記録するマニフェストの設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub fixed_ref: Option<String>,
}

impl From<&WorktreeConfig> for SnapshotManifest {
    fn from(config: &WorktreeConfig) -> Self {
        Self {
            url: config.url.clone(),
            branch: config.branch.clone(),
            groups: config.configured_groups().to_vec(),
            fixed_ref: config.fixed_ref.clone(),
        }
    }
}

/// リポジトリごとのコミットの記録
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// 読み込んだ形式（旧形式のテキストならNone）
    pub format: Option<u32>,
    /// マニフェストの設定
    pub manifest: SnapshotManifest,
    /// srcごとのsha1
    pub refs: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn new(manifest: SnapshotManifest) -> Self {
        Self {
            format: Some(SNAPSHOT_FORMAT),
            manifest,
            refs: BTreeMap::new(),
        }
    }

    /// srcのsha1を記録
    pub fn record(&mut self, src: impl Into<String>, sha1: impl Into<String>) {
        self.refs.insert(src.into(), sha1.into());
    }
}
