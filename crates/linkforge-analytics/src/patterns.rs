//! Structural pattern discovery: hubs, hierarchies, cycles.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use linkforge_graph::Edge;

use crate::adjacency::GraphIndex;
use crate::metrics::{degree_centrality, CentralNodeV1};

const HUB_MIN_DEGREE: f64 = 5.0;
const HUB_AVG_FACTOR: f64 = 1.5;
const MAX_REPORTED_HUBS: usize = 3;
const MAX_REPORTED_CYCLES: usize = 3;
const MIN_CYCLE_LEN: usize = 3;
const HIERARCHICAL_EDGE_TYPE: &str = "hierarchical";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyV1 {
    pub root: String,
    /// Direct children of the root.
    pub child_count: usize,
    /// Longest chain below the root.
    pub depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternReportV1 {
    /// Nodes whose degree is at least `max(5, 1.5 * avg_degree)`.
    pub hubs: Vec<CentralNodeV1>,
    pub hierarchies: Vec<HierarchyV1>,
    /// First few simple cycles, as node-id paths; consecutive ids (and last
    /// back to first) are adjacent.
    pub cycles: Vec<Vec<String>>,
}

pub(crate) fn find_patterns(index: &GraphIndex<'_>, edges: &[Edge]) -> PatternReportV1 {
    PatternReportV1 {
        hubs: find_hubs(index),
        hierarchies: find_hierarchies(index, edges),
        cycles: find_cycles(index),
    }
}

fn find_hubs(index: &GraphIndex<'_>) -> Vec<CentralNodeV1> {
    let threshold = HUB_MIN_DEGREE.max(HUB_AVG_FACTOR * index.avg_degree());
    degree_centrality(index, index.len())
        .into_iter()
        .filter(|c| c.degree as f64 >= threshold)
        .take(MAX_REPORTED_HUBS)
        .collect()
}

/// Edges typed `hierarchical` define a child -> parent relation. A root is a
/// node that appears as a parent but never as a child. Depth walks downward
/// from the root with a per-path visited set so cyclic references terminate.
fn find_hierarchies(index: &GraphIndex<'_>, edges: &[Edge]) -> Vec<HierarchyV1> {
    let mut children: AHashMap<usize, Vec<usize>> = AHashMap::new();
    let mut child_nodes: AHashSet<usize> = AHashSet::new();
    let mut parent_nodes: AHashSet<usize> = AHashSet::new();

    for edge in edges {
        if edge.edge_type != HIERARCHICAL_EDGE_TYPE {
            continue;
        }
        let (Some(&child), Some(&parent)) = (
            index.index_of.get(edge.source.as_str()),
            index.index_of.get(edge.target.as_str()),
        ) else {
            continue;
        };
        children.entry(parent).or_default().push(child);
        child_nodes.insert(child);
        parent_nodes.insert(parent);
    }

    let mut out = Vec::new();
    for root in 0..index.len() {
        if !parent_nodes.contains(&root) || child_nodes.contains(&root) {
            continue;
        }
        let child_count = children.get(&root).map(Vec::len).unwrap_or(0);
        let depth = subtree_depth(root, &children, index.len());
        if child_count >= 2 || depth >= 2 {
            out.push(HierarchyV1 {
                root: index.nodes[root].id.clone(),
                child_count,
                depth,
            });
        }
    }
    out
}

fn subtree_depth(root: usize, children: &AHashMap<usize, Vec<usize>>, n: usize) -> usize {
    let mut on_path = vec![false; n];
    on_path[root] = true;
    // (node, next child index) frames.
    let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
    let mut max_depth = 0usize;

    while let Some(frame) = stack.last_mut() {
        let (node, idx) = *frame;
        let kids = children.get(&node).map(Vec::as_slice).unwrap_or(&[]);
        if idx < kids.len() {
            frame.1 += 1;
            let kid = kids[idx];
            if on_path[kid] {
                continue;
            }
            on_path[kid] = true;
            stack.push((kid, 0));
            max_depth = max_depth.max(stack.len() - 1);
        } else {
            on_path[node] = false;
            stack.pop();
        }
    }
    max_depth
}

/// DFS tracking the current path; when a neighbor is already on the path the
/// slice from its first occurrence is a cycle. The immediate parent is
/// skipped so a single edge does not read as a two-cycle. Reports the first
/// few distinct cycles of length >= 3.
fn find_cycles(index: &GraphIndex<'_>) -> Vec<Vec<String>> {
    let n = index.len();
    let mut visited = vec![false; n];
    let mut cycles: Vec<Vec<String>> = Vec::new();
    let mut seen: AHashSet<Vec<usize>> = AHashSet::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }
        let mut on_path = vec![false; n];
        let mut path: Vec<usize> = vec![start];
        // (node, parent, next neighbor index) frames.
        let mut stack: Vec<(usize, usize, usize)> = vec![(start, usize::MAX, 0)];
        visited[start] = true;
        on_path[start] = true;

        while let Some(frame) = stack.last_mut() {
            let (node, parent, idx) = *frame;
            if idx < index.adj[node].len() {
                frame.2 += 1;
                let next = index.adj[node][idx];
                if next == parent {
                    continue;
                }
                if on_path[next] {
                    let pos = path
                        .iter()
                        .position(|&p| p == next)
                        .unwrap_or(path.len() - 1);
                    let cycle = &path[pos..];
                    if cycle.len() >= MIN_CYCLE_LEN {
                        let mut key = cycle.to_vec();
                        key.sort_unstable();
                        if seen.insert(key) {
                            cycles.push(
                                cycle
                                    .iter()
                                    .map(|&i| index.nodes[i].id.clone())
                                    .collect(),
                            );
                            if cycles.len() == MAX_REPORTED_CYCLES {
                                return cycles;
                            }
                        }
                    }
                } else if !visited[next] {
                    visited[next] = true;
                    on_path[next] = true;
                    path.push(next);
                    stack.push((next, node, 0));
                }
            } else {
                on_path[node] = false;
                path.pop();
                stack.pop();
            }
        }
    }
    cycles
}
