use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::fs as async_fs;
use tracing::warn;

use crate::common::error::WtreeError;
use crate::common::result::{OptionExt, ResultExt, WtreeResult};
use crate::domain::entities::snapshot::{Snapshot, SnapshotManifest, SNAPSHOT_FORMAT};

#[derive(Serialize)]
struct SnapshotFile<'a> {
    format: u32,
    manifest: &'a SnapshotManifest,
    refs: &'a BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RawSnapshot {
    format: u32,
    #[serde(default)]
    manifest: Option<SnapshotManifest>,
    /// format 1 keeps the manifest under `manifests.default`
    #[serde(default)]
    manifests: Option<HashMap<String, SnapshotManifest>>,
    #[serde(default)]
    refs: BTreeMap<String, String>,
}

/// Reads and writes snapshot files
#[derive(Debug, Default)]
pub struct SnapshotStore;

impl SnapshotStore {
    pub fn new() -> Self {
        Self
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P, snapshot: &Snapshot) -> WtreeResult<()> {
        let path = path.as_ref();
        let content = self.to_json(snapshot)?;
        async_fs::write(path, content)
            .await
            .with_filesystem_error("Could not write snapshot", Some(path.to_path_buf()))
    }

    pub async fn load<P: AsRef<Path>>(&self, path: P) -> WtreeResult<Snapshot> {
        let path = path.as_ref();
        let content = async_fs::read_to_string(path)
            .await
            .with_filesystem_error("Could not read snapshot", Some(path.to_path_buf()))?;
        self.parse(&content)
    }

    /// Always writes the current format.
    pub fn to_json(&self, snapshot: &Snapshot) -> WtreeResult<String> {
        let file = SnapshotFile {
            format: SNAPSHOT_FORMAT,
            manifest: &snapshot.manifest,
            refs: &snapshot.refs,
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// JSON first, then the legacy `src:sha1` lines.
    pub fn parse(&self, content: &str) -> WtreeResult<Snapshot> {
        match serde_json::from_str::<serde_json::Value>(content) {
            Ok(value) => parse_json(value),
            Err(_) => Ok(parse_legacy(content)),
        }
    }
}

fn parse_json(value: serde_json::Value) -> WtreeResult<Snapshot> {
    let raw: RawSnapshot = serde_json::from_value(value)?;
    let manifest = match raw.format {
        1 => raw
            .manifests
            .and_then(|mut m| m.remove("default"))
            .ok_or_validation_error("Snapshot has no default manifest")?,
        2 => raw
            .manifest
            .ok_or_validation_error("Snapshot has no manifest")?,
        other => {
            return Err(WtreeError::validation_error(format!(
                "unknown format: {}",
                other
            )))
        }
    };
    Ok(Snapshot {
        format: Some(raw.format),
        manifest,
        refs: raw.refs,
    })
}

fn parse_legacy(content: &str) -> Snapshot {
    let mut snapshot = Snapshot {
        format: None,
        ..Default::default()
    };
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let parts: Vec<&str> = line.split(':').collect();
        match parts.as_slice() {
            [src, sha1] => snapshot.record(src.trim(), sha1.trim()),
            _ => warn!("could not parse {}", line),
        }
    }
    snapshot
}
