//! 名前から依存先へのマップに対するトポロジカルソートと循環検出
//!
//! 通常のソートは寛容で、訪問中のノードに再び出会った場合は読み飛ばす。
//! 循環は最初の再訪で断ち切られ、それまでの部分順序が残る。
//! [`assert_acyclic`]は同じ走査を厳密モードで行い、最初の循環をエラーにする。

use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// 各ノードの依存先（宣言順）
pub type DependencyEdges = HashMap<String, Vec<String>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(
    "Circular dependency error: Starting from '{node}', node '{parent}' depends on '{node}', complete path {path:?}"
)]
pub struct CycleError {
    /// 走査が自分自身に戻ってきたノード
    pub node: String,
    /// 循環を閉じる辺を持つノード
    pub parent: String,
    /// 循環を見つけるまでに求めた部分順序
    pub path: Vec<String>,
}

struct Walker<'a> {
    edges: &'a DependencyEdges,
    strict: bool,
    visited: HashSet<String>,
    emitted: HashSet<String>,
    result: Vec<String>,
}

impl<'a> Walker<'a> {
    fn new(edges: &'a DependencyEdges, strict: bool) -> Self {
        Self {
            edges,
            strict,
            visited: HashSet::new(),
            emitted: HashSet::new(),
            result: Vec::new(),
        }
    }

    fn visit(&mut self, head: &str, parent: &str, top: &str) -> Result<(), CycleError> {
        if self.visited.contains(head) {
            if self.strict && head == top {
                return Err(CycleError {
                    node: head.to_string(),
                    parent: parent.to_string(),
                    path: self.result.clone(),
                });
            }
            return Ok(());
        }
        self.visited.insert(head.to_string());

        let edges = self.edges;
        if let Some(deps) = edges.get(head) {
            for dep in deps {
                if !self.emitted.contains(dep) {
                    self.visit(dep, head, top)?;
                }
            }
        }

        self.emitted.insert(head.to_string());
        self.result.push(head.to_string());
        Ok(())
    }
}

/// `roots`とその依存先すべてを依存先が先になるように並べる
///
/// 各ルートは自分の依存先の後に来る。ルートは与えられた順に処理する。
/// グラフに循環があっても失敗しない。
pub fn topological_sort<S: AsRef<str>>(edges: &DependencyEdges, roots: &[S]) -> Vec<String> {
    let mut walker = Walker::new(edges, false);
    for root in roots {
        let root = root.as_ref();
        if !walker.emitted.contains(root) {
            // 寛容な走査は失敗しない
            let _ = walker.visit(root, root, root);
        }
    }
    walker.result
}

/// いずれかのノードから到達できる最初の循環でエラーにする
pub fn assert_acyclic(edges: &DependencyEdges) -> Result<(), CycleError> {
    let mut nodes: Vec<&String> = edges.keys().collect();
    nodes.sort();
    for node in nodes {
        Walker::new(edges, true).visit(node, node, node)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn graph(spec: &[(&str, &[&str])]) -> DependencyEdges {
        spec.iter()
            .map(|(node, deps)| {
                (
                    node.to_string(),
                    deps.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_simple_sort() {
        let edges = graph(&[("a", &["b", "c", "d"]), ("b", &["e", "c"])]);
        assert_eq!(topological_sort(&edges, &["a"]), vec!["e", "c", "b", "d", "a"]);
    }

    #[test]
    fn test_sort_with_self_loop_is_lenient() {
        let edges = graph(&[("a", &["g", "b", "c", "d"]), ("b", &["e", "c"]), ("e", &["e", "c"])]);
        assert_eq!(
            topological_sort(&edges, &["a"]),
            vec!["g", "c", "e", "b", "d", "a"]
        );
    }

    #[test]
    fn test_two_node_cycle() {
        let edges = graph(&[("a", &["b"]), ("b", &["a"])]);
        assert_eq!(topological_sort(&edges, &["a"]), vec!["b", "a"]);
        assert_eq!(topological_sort(&edges, &["b"]), vec!["a", "b"]);
    }

    #[test]
    fn test_multiple_roots() {
        let edges = graph(&[
            ("a", &["g", "b", "c", "d"]),
            ("b", &["e", "c"]),
            ("q", &["u", "i"]),
            ("i", &["y", "o"]),
            ("e", &["g", "c"]),
        ]);
        assert_eq!(
            topological_sort(&edges, &["a"]),
            vec!["g", "c", "e", "b", "d", "a"]
        );
        assert_eq!(
            topological_sort(&edges, &["a", "q"]),
            vec!["g", "c", "e", "b", "d", "a", "u", "y", "o", "i", "q"]
        );
    }

    #[test]
    fn test_realistic_project_tree() {
        let edges = graph(&[
            ("head", &["telepathe", "opennao-tools", "naoqi"]),
            ("toolchain", &[]),
            ("python-pc", &["toolchain"]),
            ("telepathe", &["naoqi"]),
            ("qt-pc", &["toolchain"]),
            ("opennao-tools", &["toolchain"]),
            ("naoqi", &["qt-pc", "python-pc", "streamer", "toolchain"]),
        ]);
        assert_eq!(
            topological_sort(&edges, &["head"]),
            vec![
                "toolchain",
                "qt-pc",
                "python-pc",
                "streamer",
                "naoqi",
                "telepathe",
                "opennao-tools",
                "head"
            ]
        );
    }

    #[test]
    fn test_sort_is_idempotent_on_its_own_chain() {
        let edges = graph(&[
            ("a", &["g", "b", "c", "d"]),
            ("b", &["e", "c"]),
            ("e", &["g", "c"]),
        ]);
        let sorted = topological_sort(&edges, &["a"]);

        let mut chain = DependencyEdges::new();
        for pair in sorted.windows(2) {
            chain.insert(pair[1].clone(), vec![pair[0].clone()]);
        }
        let last = sorted.last().unwrap().clone();
        assert_eq!(topological_sort(&chain, &[last]), sorted);
    }

    #[test]
    fn test_dependencies_come_first_on_generated_dag() {
        // 辺は大きい番号から小さい番号にだけ向かう
        let mut seed: u64 = 42;
        let mut edges = DependencyEdges::new();
        for i in 1..40u64 {
            let mut deps = Vec::new();
            for j in 0..i {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                if (seed >> 33) % 4 == 0 {
                    deps.push(format!("n{}", j));
                }
            }
            edges.insert(format!("n{}", i), deps);
        }
        let roots: Vec<String> = (0..40).map(|i| format!("n{}", i)).collect();
        let sorted = topological_sort(&edges, &roots);
        assert_eq!(sorted.len(), 40);

        let index = |name: &str| sorted.iter().position(|n| n == name).unwrap();
        for (node, deps) in &edges {
            for dep in deps {
                assert!(index(dep) < index(node), "{} should come before {}", dep, node);
            }
        }
        assert!(assert_acyclic(&edges).is_ok());
    }

    #[test]
    fn test_assert_acyclic_passes_on_dag() {
        let edges = graph(&[("a", &["g", "b", "c", "d"]), ("b", &["e", "c"]), ("e", &["g", "c"])]);
        assert!(assert_acyclic(&edges).is_ok());
    }

    #[test]
    fn test_assert_acyclic_reports_self_loop() {
        let edges = graph(&[("a", &["g", "b", "c", "d"]), ("b", &["e", "c"]), ("e", &["e", "c"])]);
        let err = assert_acyclic(&edges).unwrap_err();
        assert_eq!(err.node, "e");
        assert_eq!(err.parent, "e");
        assert!(err.path.is_empty());
        assert_eq!(
            err.to_string(),
            "Circular dependency error: Starting from 'e', node 'e' depends on 'e', complete path []"
        );
    }

    #[test]
    fn test_assert_acyclic_finds_cycle_not_through_first_root() {
        let edges = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["b"])]);
        let err = assert_acyclic(&edges).unwrap_err();
        assert_eq!(err.node, "b");
        assert_eq!(err.parent, "c");
    }
}
