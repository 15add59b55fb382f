//! Connected components over the undirected graph.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::adjacency::GraphIndex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentReportV1 {
    pub component_count: usize,
    /// node id -> component id, components numbered in order of discovery.
    pub assignments: BTreeMap<String, usize>,
}

/// Iterative DFS with an explicit stack; recursion would overflow on long
/// chains from large imports.
pub(crate) fn connected_components(index: &GraphIndex<'_>) -> ComponentReportV1 {
    let n = index.len();
    let mut component: Vec<Option<usize>> = vec![None; n];
    let mut next_id = 0usize;

    for start in 0..n {
        if component[start].is_some() {
            continue;
        }
        let id = next_id;
        next_id += 1;
        let mut stack = vec![start];
        component[start] = Some(id);
        while let Some(u) = stack.pop() {
            for &v in &index.adj[u] {
                if component[v].is_none() {
                    component[v] = Some(id);
                    stack.push(v);
                }
            }
        }
    }

    let assignments = index
        .nodes
        .iter()
        .enumerate()
        .filter_map(|(i, node)| component[i].map(|c| (node.id.clone(), c)))
        .collect();

    ComponentReportV1 {
        component_count: next_id,
        assignments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkforge_graph::{Edge, Node};

    #[test]
    fn two_islands() {
        let nodes = vec![
            Node::new("a", "person", "a"),
            Node::new("b", "person", "b"),
            Node::new("c", "person", "c"),
            Node::new("d", "person", "d"),
        ];
        let edges = vec![
            Edge::new("e1", "a", "b", "knows"),
            Edge::new("e2", "c", "d", "knows"),
        ];
        let index = GraphIndex::build(&nodes, &edges);
        let report = connected_components(&index);
        assert_eq!(report.component_count, 2);
        assert_eq!(report.assignments["a"], report.assignments["b"]);
        assert_eq!(report.assignments["c"], report.assignments["d"]);
        assert_ne!(report.assignments["a"], report.assignments["c"]);
        // Discovery order: the component containing the first node gets id 0.
        assert_eq!(report.assignments["a"], 0);
    }

    #[test]
    fn isolated_nodes_get_their_own_component() {
        let nodes = vec![Node::new("a", "person", "a"), Node::new("b", "person", "b")];
        let index = GraphIndex::build(&nodes, &[]);
        let report = connected_components(&index);
        assert_eq!(report.component_count, 2);
    }

    #[test]
    fn empty_graph() {
        let index = GraphIndex::build(&[], &[]);
        let report = connected_components(&index);
        assert_eq!(report.component_count, 0);
        assert!(report.assignments.is_empty());
    }
}
