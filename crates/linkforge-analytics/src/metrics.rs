//! Basic graph metrics and degree centrality.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use linkforge_graph::Edge;

use crate::adjacency::GraphIndex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphMetricsV1 {
    pub node_count: usize,
    pub edge_count: usize,
    /// Node count per declared type.
    pub node_types: BTreeMap<String, usize>,
    /// Edge count per declared type.
    pub edge_types: BTreeMap<String, usize>,
    /// `2|E| / (|V|(|V|-1))` for |V| > 1, else 0.
    pub density: f64,
    pub avg_degree: f64,
    pub max_degree: usize,
    /// First node (in insertion order) achieving `max_degree`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_degree_node: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentralNodeV1 {
    pub id: String,
    pub label: String,
    pub degree: usize,
}

pub(crate) fn graph_metrics(index: &GraphIndex<'_>, edges: &[Edge]) -> GraphMetricsV1 {
    let n = index.len();

    let mut node_types: BTreeMap<String, usize> = BTreeMap::new();
    for node in index.nodes {
        *node_types.entry(node.node_type.clone()).or_insert(0) += 1;
    }
    let mut edge_types: BTreeMap<String, usize> = BTreeMap::new();
    for edge in edges {
        *edge_types.entry(edge.edge_type.clone()).or_insert(0) += 1;
    }

    let density = if n > 1 {
        2.0 * edges.len() as f64 / (n as f64 * (n as f64 - 1.0))
    } else {
        0.0
    };

    let mut max_degree = 0usize;
    let mut max_degree_node = None;
    for i in 0..n {
        if index.degree(i) > max_degree {
            max_degree = index.degree(i);
            max_degree_node = Some(index.nodes[i].id.clone());
        }
    }

    GraphMetricsV1 {
        node_count: n,
        edge_count: edges.len(),
        node_types,
        edge_types,
        density,
        avg_degree: index.avg_degree(),
        max_degree,
        max_degree_node,
    }
}

/// Nodes ranked by degree, descending; ties broken by id so the ranking is
/// stable across runs.
pub(crate) fn degree_centrality(index: &GraphIndex<'_>, top: usize) -> Vec<CentralNodeV1> {
    let mut ranked: Vec<usize> = (0..index.len()).collect();
    ranked.sort_by(|&a, &b| {
        index
            .degree(b)
            .cmp(&index.degree(a))
            .then_with(|| index.nodes[a].id.cmp(&index.nodes[b].id))
    });
    ranked
        .into_iter()
        .take(top)
        .map(|i| CentralNodeV1 {
            id: index.nodes[i].id.clone(),
            label: index.nodes[i].label.clone(),
            degree: index.degree(i),
        })
        .collect()
}
