use std::path::Path;
use tokio::fs as async_fs;
use tracing::debug;
use xot::Node;

use super::manifest_store::{attach_file, required};
use crate::common::error::WtreeError;
use crate::common::result::WtreeResult;
use crate::domain::entities::package::{BuildProject, DepPhase, Dependencies};
use crate::infrastructure::xml::{XmlDocument, XmlElement};

/// Name of the file declaring a build project
pub const PROJECT_FILE_NAME: &str = "qiproject.xml";

/// Read every `<depends>` child of `node`.
///
/// One `<depends>` element may feed several phases at once.
pub(crate) fn read_depends(doc: &XmlDocument, node: Node) -> WtreeResult<Dependencies> {
    let mut dependencies = Dependencies::new();
    for depends in doc.children_named(node, "depends") {
        let phases = [
            (DepPhase::Build, doc.bool_attribute(depends, "buildtime")?),
            (DepPhase::Run, doc.bool_attribute(depends, "runtime")?),
            (DepPhase::Test, doc.bool_attribute(depends, "testtime")?),
        ];
        for name in doc.list_attribute(depends, "names") {
            for (phase, enabled) in phases {
                if enabled == Some(true) {
                    dependencies.add(phase, name.clone());
                }
            }
        }
    }
    Ok(dependencies)
}

/// `<depends>` elements, one per non-empty phase.
pub(crate) fn write_depends(mut element: XmlElement, dependencies: &Dependencies) -> XmlElement {
    for (phase, attribute) in [
        (DepPhase::Build, "buildtime"),
        (DepPhase::Run, "runtime"),
        (DepPhase::Test, "testtime"),
    ] {
        let names = dependencies.get(phase);
        if !names.is_empty() {
            element = element.child(
                XmlElement::new("depends")
                    .attr(attribute, "true")
                    .attr("names", names.join(" ")),
            );
        }
    }
    element
}

/// Reads `qiproject.xml` files
#[derive(Debug, Default)]
pub struct ProjectStore;

impl ProjectStore {
    pub fn new() -> Self {
        Self
    }

    pub async fn read_project<P: AsRef<Path>>(&self, path: P) -> WtreeResult<BuildProject> {
        let path = path.as_ref();
        let content = async_fs::read_to_string(path).await.map_err(|e| {
            WtreeError::filesystem_error_with_source(
                "Could not read project file",
                Some(path.to_path_buf()),
                e,
            )
        })?;
        self.parse_project(&content)
            .map_err(|e| attach_file(e, path.to_path_buf()))
    }

    /// Accepts both `<project name>` and `<project><qibuild name/></project>`.
    pub fn parse_project(&self, xml: &str) -> WtreeResult<BuildProject> {
        let doc = XmlDocument::parse_with_root(xml, "project")?;
        let node = doc.child_named(doc.root(), "qibuild").unwrap_or(doc.root());
        let name = required(&doc, node, "name", "project")?;
        Ok(BuildProject {
            name,
            dependencies: read_depends(&doc, node)?,
        })
    }

    /// Build projects found at the top of the given worktree sources.
    pub async fn discover(&self, worktree_root: &Path, srcs: &[String]) -> WtreeResult<Vec<BuildProject>> {
        let mut projects = Vec::new();
        for src in srcs {
            let path = worktree_root.join(src).join(PROJECT_FILE_NAME);
            if path.exists() {
                debug!("Found build project in {}", src);
                projects.push(self.read_project(&path).await?);
            }
        }
        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_parse_project() {
        let project = ProjectStore::new()
            .parse_project(
                r#"<project name="hello">
                     <depends buildtime="true" runtime="true" names="world boost" />
                     <depends testtime="true" names="gtest" />
                   </project>"#,
            )
            .unwrap();

        assert_eq!(project.name, "hello");
        assert_eq!(project.dependencies.build, vec!["world", "boost"]);
        assert_eq!(project.dependencies.run, vec!["world", "boost"]);
        assert_eq!(project.dependencies.test, vec!["gtest"]);
    }

    #[test]
    fn test_parse_version_3_project() {
        let project = ProjectStore::new()
            .parse_project(
                r#"<project version="3">
                     <qibuild name="hello"><depends buildtime="true" names="world"/></qibuild>
                   </project>"#,
            )
            .unwrap();

        assert_eq!(project.name, "hello");
        assert_eq!(project.dependencies.build, vec!["world"]);
    }

    #[test]
    fn test_missing_name() {
        let err = ProjectStore::new().parse_project("<project/>").unwrap_err();
        assert!(matches!(err, WtreeError::ValidationError { .. }));
    }

    #[tokio::test]
    async fn test_discover_skips_sources_without_project_file() {
        let temp_dir = TempDir::new().unwrap();
        let hello = temp_dir.path().join("hello");
        std::fs::create_dir_all(&hello).unwrap();
        std::fs::create_dir_all(temp_dir.path().join("docs")).unwrap();
        std::fs::write(hello.join(PROJECT_FILE_NAME), r#"<project name="hello"/>"#).unwrap();

        let projects = ProjectStore::new()
            .discover(temp_dir.path(), &["hello".to_string(), "docs".to_string()])
            .await
            .unwrap();

        assert_eq!(projects, vec![BuildProject::new("hello")]);
    }
}
