//! Modularity-greedy community detection.
//!
//! A single-level local-moving pass in the Louvain family, deliberately
//! simplified: the gain for moving a node is `(e_to_new - e_to_old) / (2m)`,
//! i.e. the change in intra-community edge fraction without the degree
//! penalty term. This matches the established behavior of the tool this
//! engine replaces; the reported `modularity` uses the full formula so the
//! partition quality is still comparable.

use linkforge_ingest::Warning;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::adjacency::GraphIndex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityReportV1 {
    pub community_count: usize,
    /// Newman modularity of the final partition.
    pub modularity: f64,
    /// Sweeps actually performed.
    pub sweeps: usize,
    pub converged: bool,
    /// node id -> community id, communities renumbered 0..C-1 by first
    /// appearance in node order.
    pub assignments: BTreeMap<String, usize>,
}

pub(crate) fn detect_communities(
    index: &GraphIndex<'_>,
    max_iterations: usize,
    warnings: &mut Vec<Warning>,
) -> CommunityReportV1 {
    let n = index.len();
    let m = index.edge_count as f64;

    // Each node starts in its own community.
    let mut community: Vec<usize> = (0..n).collect();
    let mut sweeps = 0usize;
    let mut converged = m == 0.0 || n == 0;

    if !converged {
        for _ in 0..max_iterations {
            sweeps += 1;
            let mut moved = false;
            for u in 0..n {
                let cur = community[u];

                // Edge weight from u into each neighboring community. BTreeMap
                // keeps candidate order deterministic.
                let mut weights: BTreeMap<usize, f64> = BTreeMap::new();
                for &v in &index.adj[u] {
                    *weights.entry(community[v]).or_insert(0.0) += 1.0;
                }
                let e_old = weights.get(&cur).copied().unwrap_or(0.0);

                let mut best = cur;
                let mut best_gain = 0.0;
                for (&c, &e_new) in &weights {
                    if c == cur {
                        continue;
                    }
                    let gain = (e_new - e_old) / (2.0 * m);
                    if gain > best_gain + 1e-12 {
                        best_gain = gain;
                        best = c;
                    }
                }

                if best != cur {
                    community[u] = best;
                    moved = true;
                }
            }
            if !moved {
                converged = true;
                break;
            }
        }
        if !converged {
            warnings.push(Warning::new(format!(
                "community detection stopped after {sweeps} sweeps without converging; returning current partition"
            )));
        }
    }

    // Renumber to dense ids in node order.
    let mut dense: BTreeMap<usize, usize> = BTreeMap::new();
    let mut next = 0usize;
    for c in community.iter_mut() {
        let id = *dense.entry(*c).or_insert_with(|| {
            let d = next;
            next += 1;
            d
        });
        *c = id;
    }

    let modularity = modularity_of(index, &community, next, m);

    let assignments = index
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id.clone(), community[i]))
        .collect();

    CommunityReportV1 {
        community_count: next,
        modularity,
        sweeps,
        converged,
        assignments,
    }
}

/// Full Newman modularity: `Q = sum_c (m_c/m - (d_c/2m)^2)`.
fn modularity_of(index: &GraphIndex<'_>, community: &[usize], count: usize, m: f64) -> f64 {
    if m == 0.0 || count == 0 {
        return 0.0;
    }
    let mut intra = vec![0.0f64; count];
    let mut degree_total = vec![0.0f64; count];
    for u in 0..index.len() {
        degree_total[community[u]] += index.degree(u) as f64;
        for &v in &index.adj[u] {
            // Count each undirected edge once (self-loops appear once in adj).
            if v < u {
                continue;
            }
            if community[u] == community[v] {
                intra[community[u]] += 1.0;
            }
        }
    }
    (0..count)
        .map(|c| intra[c] / m - (degree_total[c] / (2.0 * m)).powi(2))
        .sum()
}
