use std::path::Path;
use tokio::fs as async_fs;
use tracing::debug;

use super::manifest_store::{attach_file, required};
use crate::common::error::WtreeError;
use crate::common::result::WtreeResult;
use crate::domain::entities::repository::{Branch, Remote};
use crate::domain::entities::worktree::GitProject;
use crate::infrastructure::xml::{XmlDocument, XmlElement};

/// Reads and writes the local cache of tracked repositories (`.qi/git.xml`)
#[derive(Debug, Default)]
pub struct GitCacheStore;

impl GitCacheStore {
    pub fn new() -> Self {
        Self
    }

    /// Load the cached projects. A missing file means an empty worktree.
    pub async fn load<P: AsRef<Path>>(&self, path: P) -> WtreeResult<Vec<GitProject>> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No local cache at {}", path.display());
            return Ok(Vec::new());
        }
        let content = async_fs::read_to_string(path).await.map_err(|e| {
            WtreeError::filesystem_error_with_source(
                "Could not read local cache",
                Some(path.to_path_buf()),
                e,
            )
        })?;
        self.parse(&content)
            .map_err(|e| attach_file(e, path.to_path_buf()))
    }

    pub fn parse(&self, xml: &str) -> WtreeResult<Vec<GitProject>> {
        let doc = XmlDocument::parse_with_root(xml, "worktree")?;
        let mut projects = Vec::new();
        for node in doc.children_named(doc.root(), "project") {
            let mut project = GitProject::new(required(&doc, node, "src", "project")?);
            project.fixed_ref = doc.string_attribute(node, "ref");
            for remote_node in doc.children_named(node, "remote") {
                let remote = Remote::new(
                    required(&doc, remote_node, "name", "remote")?,
                    required(&doc, remote_node, "url", "remote")?,
                )
                .with_review(doc.bool_attribute(remote_node, "review")?.unwrap_or(false))
                .with_default(doc.bool_attribute(remote_node, "default")?.unwrap_or(false));
                project.remotes.push(remote);
            }
            for branch_node in doc.children_named(node, "branch") {
                let mut branch = Branch::new(required(&doc, branch_node, "name", "branch")?);
                branch.tracks = doc.string_attribute(branch_node, "tracks");
                branch.remote_branch = doc.string_attribute(branch_node, "remote_branch");
                branch.default = doc.bool_attribute(branch_node, "default")?.unwrap_or(false);
                project.branches.push(branch);
            }
            projects.push(project);
        }
        Ok(projects)
    }

    /// Rewrite the whole cache, projects sorted by src.
    pub async fn save<P: AsRef<Path>>(&self, path: P, projects: &[GitProject]) -> WtreeResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent).await.map_err(|e| {
                WtreeError::filesystem_error_with_source(
                    "Could not create metadata directory",
                    Some(parent.to_path_buf()),
                    e,
                )
            })?;
        }
        let content = self.to_xml(projects)?;
        async_fs::write(path, content).await.map_err(|e| {
            WtreeError::filesystem_error_with_source(
                "Could not write local cache",
                Some(path.to_path_buf()),
                e,
            )
        })?;
        debug!("Wrote {} projects to {}", projects.len(), path.display());
        Ok(())
    }

    pub fn to_xml(&self, projects: &[GitProject]) -> WtreeResult<String> {
        let mut sorted: Vec<&GitProject> = projects.iter().collect();
        sorted.sort_by(|a, b| a.src.cmp(&b.src));

        let mut root = XmlElement::new("worktree");
        for project in sorted {
            let mut element = XmlElement::new("project")
                .attr("src", project.src.as_str())
                .opt_attr("ref", project.fixed_ref.as_deref());
            for remote in &project.remotes {
                let mut remote_element = XmlElement::new("remote")
                    .attr("name", remote.name.as_str())
                    .attr("url", remote.url.as_str());
                if remote.review {
                    remote_element = remote_element.attr("review", "true");
                }
                if remote.default {
                    remote_element = remote_element.attr("default", "true");
                }
                element = element.child(remote_element);
            }
            for branch in &project.branches {
                let mut branch_element = XmlElement::new("branch")
                    .attr("name", branch.name.as_str())
                    .opt_attr("tracks", branch.tracks.as_deref())
                    .opt_attr("remote_branch", branch.remote_branch.as_deref());
                if branch.default {
                    branch_element = branch_element.attr("default", "true");
                }
                element = element.child(branch_element);
            }
            root = root.child(element);
        }
        Ok(root.to_xml_string()?)
    }
}
