//! Dense adjacency built once per analysis run.
//!
//! All algorithms work over `usize` node indices rather than string ids: the
//! resolver guarantees unique ids, so the first occurrence wins and duplicates
//! are ignored. Edges referencing unknown endpoints are skipped here (the
//! resolver already drops them, but imported graphs may not have gone through
//! resolution).

use ahash::AHashMap;
use linkforge_graph::{Edge, Node};

pub(crate) struct GraphIndex<'a> {
    pub nodes: &'a [Node],
    pub index_of: AHashMap<&'a str, usize>,
    /// Undirected neighbor lists in edge insertion order. A self-loop
    /// contributes a single entry.
    pub adj: Vec<Vec<usize>>,
    /// Edges whose endpoints both resolved to a node.
    pub edge_count: usize,
}

impl<'a> GraphIndex<'a> {
    pub fn build(nodes: &'a [Node], edges: &'a [Edge]) -> Self {
        let mut index_of: AHashMap<&str, usize> = AHashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            index_of.entry(node.id.as_str()).or_insert(i);
        }

        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        let mut edge_count = 0usize;
        for edge in edges {
            let (Some(&s), Some(&t)) = (
                index_of.get(edge.source.as_str()),
                index_of.get(edge.target.as_str()),
            ) else {
                continue;
            };
            edge_count += 1;
            if s == t {
                adj[s].push(s);
            } else {
                adj[s].push(t);
                adj[t].push(s);
            }
        }

        Self {
            nodes,
            index_of,
            adj,
            edge_count,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn degree(&self, i: usize) -> usize {
        self.adj[i].len()
    }

    pub fn avg_degree(&self) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        let total: usize = self.adj.iter().map(Vec::len).sum();
        total as f64 / self.nodes.len() as f64
    }
}
