use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::common::error::WtreeError;
use crate::common::result::WtreeResult;
use crate::domain::entities::package::{BuildProject, DepPhase, Dependencies, Package};
use crate::domain::services::dependency_graph::{assert_acyclic, topological_sort, DependencyEdges};

/// 依存関係の解決結果（すべて依存される側が先）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SolveResult {
    /// ビルドプロジェクト
    pub projects: Vec<String>,
    /// ツールチェインのパッケージ
    pub packages: Vec<String>,
    /// どちらにも見つからなかった名前
    pub not_found: Vec<String>,
}

/// ビルドプロジェクトとパッケージをまたいで依存関係を解決するサービス
pub struct DepsSolver<'a> {
    projects: &'a [BuildProject],
    packages: &'a [Package],
}

impl<'a> DepsSolver<'a> {
    /// 新しいDepsSolverインスタンスを作成
    pub fn new(projects: &'a [BuildProject], packages: &'a [Package]) -> Self {
        Self { projects, packages }
    }

    /// 辿るフェーズ（ビルド時か実行時、必要ならテスト時も）
    pub fn phases(runtime: bool, test: bool) -> Vec<DepPhase> {
        let mut phases = vec![if runtime { DepPhase::Run } else { DepPhase::Build }];
        if test {
            phases.push(DepPhase::Test);
        }
        phases
    }

    /// 依存グラフ
    ///
    /// パッケージの依存関係を先に入れ、同名のプロジェクトで上書きする。
    pub fn edges(&self, phases: &[DepPhase]) -> DependencyEdges {
        let mut edges = DependencyEdges::new();
        for package in self.packages {
            edges.insert(package.name.clone(), package.dependencies.collect(phases));
        }
        for project in self.projects {
            edges.insert(project.name.clone(), project.dependencies.collect(phases));
        }
        edges
    }

    /// `names`とその依存関係をプロジェクトとパッケージに分類して並べる
    pub fn solve(&self, names: &[String], runtime: bool, test: bool) -> WtreeResult<SolveResult> {
        for name in names {
            if self.find_project(name).is_none() {
                return Err(WtreeError::validation_error(format!(
                    "No such project: {}",
                    name
                )));
            }
        }

        let edges = self.edges(&Self::phases(runtime, test));
        let sorted = topological_sort(&edges, names);
        debug!("Sorted dependencies: {:?}", sorted);

        let mut result = SolveResult::default();
        for name in sorted {
            if names.contains(&name) || self.find_project(&name).is_some() {
                result.projects.push(name);
            } else if self.packages.iter().any(|p| p.name == name) {
                result.packages.push(name);
            } else {
                result.not_found.push(name);
            }
        }
        Ok(result)
    }

    /// `names`のいずれかに直接依存するプロジェクト（名前順）
    pub fn reverse_deps(&self, names: &[String], phases: &[DepPhase]) -> Vec<String> {
        self.projects
            .iter()
            .filter(|project| {
                let deps = project.dependencies.collect(phases);
                names.iter().any(|name| deps.contains(name))
            })
            .map(|project| project.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// 循環依存があればエラーにする（厳格モード）
    pub fn check_cycles(&self, phases: &[DepPhase]) -> WtreeResult<()> {
        assert_acyclic(&self.edges(phases))?;
        Ok(())
    }

    fn find_project(&self, name: &str) -> Option<&Dependencies> {
        self.projects
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.dependencies)
    }
}
