//! Core graph model: nodes, edges, and the resolved graph.

use linkforge_schema::TypedCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node/edge property bag, keyed by column name. Ordered so serialization
/// and iteration are deterministic.
pub type PropertyMap = BTreeMap<String, TypedCell>;

/// A subject of investigation (person, organization, phone, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub label: String,
    #[serde(default)]
    pub properties: PropertyMap,
    /// Values displaced during merges: one record per losing value, keyed by
    /// the column it came from (losing ids land under `id`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_row: Option<usize>,
}

/// A typed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    #[serde(default)]
    pub properties: PropertyMap,
    /// True for edges added by the resolver because two nodes share a
    /// linkable attribute.
    #[serde(default, skip_serializing_if = "is_false")]
    pub inferred: bool,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        node_type: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            label: label.into(),
            properties: PropertyMap::new(),
            aliases: Vec::new(),
            source_row: None,
        }
    }
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        edge_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            edge_type: edge_type.into(),
            properties: PropertyMap::new(),
            inferred: false,
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// The resolved graph. Nodes and edges keep insertion order; after
/// resolution, node ids are unique and every edge endpoint references an
/// existing node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
