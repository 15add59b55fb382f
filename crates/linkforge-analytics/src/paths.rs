//! Bounded shortest-path search.

use std::collections::VecDeque;

use linkforge_graph::{Edge, Node};

use crate::adjacency::GraphIndex;

pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Unweighted BFS from `source` to `target`, undirected, bounded by
/// `max_depth` edges. Returns the node-id path (source first, target last) or
/// an empty vector when either endpoint is missing or the target is
/// unreachable within the bound.
pub fn find_path(
    nodes: &[Node],
    edges: &[Edge],
    source: &str,
    target: &str,
    max_depth: usize,
) -> Vec<String> {
    let index = GraphIndex::build(nodes, edges);
    let (Some(&s), Some(&t)) = (index.index_of.get(source), index.index_of.get(target)) else {
        return Vec::new();
    };
    if s == t {
        return vec![nodes[s].id.clone()];
    }

    let mut parent: Vec<Option<usize>> = vec![None; nodes.len()];
    let mut dist: Vec<usize> = vec![usize::MAX; nodes.len()];
    let mut queue = VecDeque::new();
    dist[s] = 0;
    queue.push_back(s);

    while let Some(u) = queue.pop_front() {
        if dist[u] == max_depth {
            continue;
        }
        for &v in &index.adj[u] {
            if dist[v] != usize::MAX {
                continue;
            }
            dist[v] = dist[u] + 1;
            parent[v] = Some(u);
            if v == t {
                return reconstruct(&index, &parent, t);
            }
            queue.push_back(v);
        }
    }
    Vec::new()
}

fn reconstruct(index: &GraphIndex<'_>, parent: &[Option<usize>], t: usize) -> Vec<String> {
    let mut path = vec![t];
    let mut cur = t;
    while let Some(p) = parent[cur] {
        path.push(p);
        cur = p;
    }
    path.reverse();
    path.into_iter()
        .map(|i| index.nodes[i].id.clone())
        .collect()
}
