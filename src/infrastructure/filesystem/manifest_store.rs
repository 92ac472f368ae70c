use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tracing::debug;
use xot::Node;

use crate::common::error::WtreeError;
use crate::common::result::WtreeResult;
use crate::domain::entities::group::{Group, Groups};
use crate::domain::entities::manifest::{Manifest, RemoteDecl, RepoDecl};
use crate::domain::value_objects::remote_url::UsernameLookup;
use crate::infrastructure::xml::XmlDocument;

/// Name of the manifest file inside the manifest repository
pub const MANIFEST_FILE_NAME: &str = "manifest.xml";

/// Reads `manifest.xml` files
#[derive(Debug, Default)]
pub struct ManifestStore;

impl ManifestStore {
    pub fn new() -> Self {
        Self
    }

    /// Read, parse and validate a manifest file
    pub async fn read_manifest<P: AsRef<Path>>(
        &self,
        manifest_path: P,
        usernames: &dyn UsernameLookup,
    ) -> WtreeResult<Manifest> {
        let manifest_path = manifest_path.as_ref();
        if !manifest_path.exists() {
            return Err(WtreeError::config_error(format!(
                "Manifest file not found at path: {}",
                manifest_path.display()
            )));
        }
        debug!("Reading manifest from {}", manifest_path.display());
        let content = async_fs::read_to_string(manifest_path).await.map_err(|e| {
            WtreeError::filesystem_error_with_source(
                "Could not read manifest",
                Some(manifest_path.to_path_buf()),
                e,
            )
        })?;
        self.parse_manifest(&content, usernames)
            .map_err(|e| attach_file(e, manifest_path.to_path_buf()))
    }

    /// Parse and validate manifest XML
    pub fn parse_manifest(&self, xml: &str, usernames: &dyn UsernameLookup) -> WtreeResult<Manifest> {
        let doc = XmlDocument::parse_with_root(xml, "manifest")?;
        let root = doc.root();

        let mut remotes = Vec::new();
        for node in doc.children_named(root, "remote") {
            let name = required(&doc, node, "name", "remote")?;
            let url = required(&doc, node, "url", "remote")?;
            let mut remote = RemoteDecl::new(name, url)
                .with_review(doc.bool_attribute(node, "review")?.unwrap_or(false));
            remote.default_branch = doc.string_attribute(node, "default_branch");
            remotes.push(remote);
        }

        let default_branch = doc
            .child_named(root, "branch")
            .and_then(|node| doc.string_attribute(node, "default"));

        let mut repos = Vec::new();
        for node in doc.children_named(root, "repo") {
            let project = required(&doc, node, "project", "repo")?;
            let upstreams = doc
                .children_named(node, "upstream")
                .into_iter()
                .map(|up| {
                    Ok((
                        required(&doc, up, "name", "upstream")?,
                        required(&doc, up, "url", "upstream")?,
                    ))
                })
                .collect::<WtreeResult<Vec<_>>>()?;
            repos.push(RepoDecl {
                project,
                src: doc.string_attribute(node, "src"),
                branch: doc.string_attribute(node, "branch"),
                fixed_ref: doc.string_attribute(node, "ref"),
                remote_names: doc.list_attribute(node, "remotes"),
                default_remote: doc.string_attribute(node, "default_remote"),
                upstreams,
            });
        }

        let groups = parse_groups(&doc, root)?;

        Manifest::from_declarations(remotes, repos, groups, default_branch, usernames)
    }
}

fn parse_groups(doc: &XmlDocument, root: Node) -> WtreeResult<Groups> {
    let mut groups = Groups::new();
    let Some(groups_node) = doc.child_named(root, "groups") else {
        return Ok(groups);
    };
    for node in doc.children_named(groups_node, "group") {
        let mut group = Group::new(required(doc, node, "name", "group")?)
            .with_default(doc.bool_attribute(node, "default")?.unwrap_or(false));
        for project in doc.children_named(node, "project") {
            group = group.with_project(required(doc, project, "name", "project")?);
        }
        for subgroup in doc.children_named(node, "group") {
            group = group.with_subgroup(required(doc, subgroup, "name", "group")?);
        }
        groups.add(group);
    }
    Ok(groups)
}

/// A mandatory attribute, or a validation error naming it.
pub(crate) fn required(doc: &XmlDocument, node: Node, name: &str, element: &str) -> WtreeResult<String> {
    doc.string_attribute(node, name).ok_or_else(|| {
        WtreeError::validation_error(format!("Missing '{}' attribute in <{}>", name, element))
    })
}

pub(crate) fn attach_file(error: WtreeError, path: PathBuf) -> WtreeError {
    match error {
        WtreeError::ValidationError { message, .. } => {
            WtreeError::validation_error_in_file(message, path)
        }
        WtreeError::XmlError { message, .. } => WtreeError::xml_error(message, Some(path)),
        other => other,
    }
}
