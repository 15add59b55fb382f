//! Graph export and import.
//!
//! JSON export is a lossless round-trip of `{nodes, edges, metadata}`; CSV
//! export is a flat dump (entities and links tables) with the property bag
//! JSON-encoded into a single column.

use crate::model::{Edge, Graph, Node};
use linkforge_schema::CanonicalValue;
use serde::{Deserialize, Serialize};

pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("invalid graph JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub version: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub metadata: ExportMetadata,
}

/// Serialize a graph with version/timestamp metadata.
pub fn export_json(graph: &Graph) -> Result<String, ExportError> {
    let export = GraphExport {
        nodes: graph.nodes.clone(),
        edges: graph.edges.clone(),
        metadata: ExportMetadata {
            version: EXPORT_VERSION.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        },
    };
    Ok(serde_json::to_string_pretty(&export)?)
}

/// Restore a graph from an export blob. Metadata is tolerated but not
/// required, so hand-written `{nodes, edges}` files import too.
pub fn import_json(blob: &str) -> Result<Graph, ExportError> {
    #[derive(Deserialize)]
    struct Loose {
        #[serde(default)]
        nodes: Vec<Node>,
        #[serde(default)]
        edges: Vec<Edge>,
    }
    let loose: Loose = serde_json::from_str(blob)?;
    Ok(Graph::new(loose.nodes, loose.edges))
}

// ============================================================================
// CSV dump
// ============================================================================

/// Entities table: `id,type,label,properties`.
pub fn export_entities_csv(graph: &Graph) -> String {
    let mut out = String::from("id,type,label,properties\n");
    for node in &graph.nodes {
        out.push_str(&format!(
            "{},{},{},{}\n",
            csv_escape(&node.id),
            csv_escape(&node.node_type),
            csv_escape(&node.label),
            csv_escape(&node_properties_json(node)),
        ));
    }
    out
}

/// Links table: `id,source,target,type,properties`.
pub fn export_links_csv(graph: &Graph) -> String {
    let mut out = String::from("id,source,target,type,properties\n");
    for edge in &graph.edges {
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            csv_escape(&edge.id),
            csv_escape(&edge.source),
            csv_escape(&edge.target),
            csv_escape(&edge.edge_type),
            csv_escape(&edge_properties_json(edge)),
        ));
    }
    out
}

fn canonical_to_json(canonical: &CanonicalValue) -> serde_json::Value {
    match canonical {
        CanonicalValue::Text(s) => serde_json::Value::String(s.clone()),
        CanonicalValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        CanonicalValue::Coordinates {
            latitude,
            longitude,
        } => serde_json::json!({ "latitude": latitude, "longitude": longitude }),
    }
}

fn node_properties_json(node: &Node) -> String {
    let mut map = serde_json::Map::new();
    for (key, cell) in &node.properties {
        map.insert(key.clone(), canonical_to_json(&cell.canonical));
    }
    if !node.aliases.is_empty() {
        map.insert(
            "aliases".to_string(),
            serde_json::to_value(&node.aliases).unwrap_or(serde_json::Value::Null),
        );
    }
    serde_json::Value::Object(map).to_string()
}

fn edge_properties_json(edge: &Edge) -> String {
    let mut map = serde_json::Map::new();
    for (key, cell) in &edge.properties {
        map.insert(key.clone(), canonical_to_json(&cell.canonical));
    }
    serde_json::Value::Object(map).to_string()
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
