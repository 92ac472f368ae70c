pub mod dependency_graph;
pub mod repo_diff;
