//! Read-only analytics over a resolved graph.
//!
//! Everything here treats the graph as immutable input: metrics, degree
//! centrality, connected components, modularity-greedy community detection,
//! bounded shortest paths, and structural pattern discovery (hubs,
//! hierarchies, cycles). The only tunables are the centrality cut-off, the
//! community sweep cap, and the path depth bound; nothing in this crate can
//! block indefinitely.
//!
//! Edges are undirected for every algorithm except hierarchy detection,
//! which follows the child -> parent direction of `hierarchical` edges.

mod adjacency;
mod communities;
mod components;
mod metrics;
mod paths;
mod patterns;

use serde::{Deserialize, Serialize};

use linkforge_graph::{Edge, Node};
use linkforge_ingest::Warning;

use adjacency::GraphIndex;

pub use communities::CommunityReportV1;
pub use components::ComponentReportV1;
pub use metrics::{CentralNodeV1, GraphMetricsV1};
pub use paths::{find_path, DEFAULT_MAX_DEPTH};
pub use patterns::{HierarchyV1, PatternReportV1};

pub const ANALYSIS_VERSION: &str = "1.0";

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// How many nodes to report in `central_nodes`.
    pub top_central: usize,
    /// Sweep cap for community detection.
    pub max_iterations: usize,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            top_central: 5,
            max_iterations: 20,
        }
    }
}

// =============================================================================
// Report format
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReportV1 {
    pub version: String,
    pub metrics: GraphMetricsV1,
    pub central_nodes: Vec<CentralNodeV1>,
    pub clusters: ComponentReportV1,
    pub communities: CommunityReportV1,
    pub patterns: PatternReportV1,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

pub fn analyze(nodes: &[Node], edges: &[Edge], options: &AnalyzeOptions) -> AnalysisReportV1 {
    let index = GraphIndex::build(nodes, edges);
    let mut warnings = Vec::new();

    let metrics = metrics::graph_metrics(&index, edges);
    let central_nodes = metrics::degree_centrality(&index, options.top_central);
    let clusters = components::connected_components(&index);
    let communities = communities::detect_communities(&index, options.max_iterations, &mut warnings);
    let patterns = patterns::find_patterns(&index, edges);

    tracing::debug!(
        nodes = metrics.node_count,
        edges = metrics.edge_count,
        components = clusters.component_count,
        communities = communities.community_count,
        "analysis complete"
    );

    AnalysisReportV1 {
        version: ANALYSIS_VERSION.to_string(),
        metrics,
        central_nodes,
        clusters,
        communities,
        patterns,
        warnings,
    }
}

// =============================================================================
// Text rendering
// =============================================================================

pub fn render_analysis_text(r: &AnalysisReportV1) -> String {
    let mut out = String::new();
    out.push_str("analysis\n");
    out.push_str(&format!(
        "  nodes: {}  edges: {}  density: {:.4}\n",
        r.metrics.node_count, r.metrics.edge_count, r.metrics.density
    ));
    out.push_str(&format!(
        "  degree: avg={:.2} max={}{}\n",
        r.metrics.avg_degree,
        r.metrics.max_degree,
        r.metrics
            .max_degree_node
            .as_deref()
            .map(|id| format!(" (at {id})"))
            .unwrap_or_default()
    ));

    if !r.central_nodes.is_empty() {
        out.push_str("\ncentral nodes\n");
        for (i, c) in r.central_nodes.iter().enumerate() {
            out.push_str(&format!(
                "  {:>2}. {} ({}) degree={}\n",
                i + 1,
                c.label,
                c.id,
                c.degree
            ));
        }
    }

    out.push_str("\nstructure\n");
    out.push_str(&format!(
        "  components: {}\n",
        r.clusters.component_count
    ));
    out.push_str(&format!(
        "  communities: {} modularity={:.4} sweeps={}{}\n",
        r.communities.community_count,
        r.communities.modularity,
        r.communities.sweeps,
        if r.communities.converged {
            ""
        } else {
            " (not converged)"
        }
    ));

    if !r.patterns.hubs.is_empty() {
        out.push_str("\nhubs\n");
        for h in &r.patterns.hubs {
            out.push_str(&format!("  {} ({}) degree={}\n", h.label, h.id, h.degree));
        }
    }
    if !r.patterns.hierarchies.is_empty() {
        out.push_str("\nhierarchies\n");
        for h in &r.patterns.hierarchies {
            out.push_str(&format!(
                "  root={} children={} depth={}\n",
                h.root, h.child_count, h.depth
            ));
        }
    }
    if !r.patterns.cycles.is_empty() {
        out.push_str("\ncycles\n");
        for c in &r.patterns.cycles {
            out.push_str(&format!("  {}\n", c.join(" -> ")));
        }
    }

    if !r.warnings.is_empty() {
        out.push_str("\nwarnings\n");
        for w in &r.warnings {
            out.push_str(&format!("  {w}\n"));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Vec<Node>, Vec<Edge>) {
        let nodes = vec![
            Node::new("1", "person", "Alice"),
            Node::new("2", "person", "Bob"),
            Node::new("3", "org", "Acme"),
        ];
        let edges = vec![
            Edge::new("e1", "1", "2", "knows"),
            Edge::new("e2", "2", "3", "works-at"),
        ];
        (nodes, edges)
    }

    #[test]
    fn report_covers_all_sections() {
        let (nodes, edges) = sample();
        let report = analyze(&nodes, &edges, &AnalyzeOptions::default());
        assert_eq!(report.version, ANALYSIS_VERSION);
        assert_eq!(report.metrics.node_count, 3);
        assert_eq!(report.central_nodes[0].id, "2");
        assert_eq!(report.clusters.component_count, 1);
        assert!(report.communities.community_count >= 1);
    }

    #[test]
    fn report_round_trips_through_json() {
        let (nodes, edges) = sample();
        let report = analyze(&nodes, &edges, &AnalyzeOptions::default());
        let json = serde_json::to_string(&report).unwrap();
        let back: AnalysisReportV1 = serde_json::from_str(&json).unwrap();
        assert_eq!(back.metrics.node_count, report.metrics.node_count);
        assert_eq!(back.communities.assignments, report.communities.assignments);
    }

    #[test]
    fn text_rendering_mentions_key_figures() {
        let (nodes, edges) = sample();
        let report = analyze(&nodes, &edges, &AnalyzeOptions::default());
        let text = render_analysis_text(&report);
        assert!(text.contains("nodes: 3"));
        assert!(text.contains("central nodes"));
        assert!(text.contains("components: 1"));
    }
}
