//! Role mapping: project normalized rows into node and edge candidates.
//!
//! Each column plays exactly one role. Rows with non-empty source *and*
//! target endpoint cells become edge candidates; everything else becomes a
//! node candidate. Ambiguous rows (an id plus an endpoint pair) prefer the
//! edge reading only when both endpoints are present. No deduplication
//! happens here; that is the resolver's job.

use crate::model::{Edge, Node, PropertyMap};
use linkforge_ingest::Warning;
use linkforge_schema::{ColumnProfile, SemanticType, TypedCell, TypedRow};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

// ============================================================================
// Roles
// ============================================================================

/// The semantic function of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Id,
    Type,
    Label,
    SourceId,
    TargetId,
    Date,
    Property,
    Ignore,
}

impl Role {
    /// Lenient parse for user-supplied assignments (`source_id` and
    /// `sourceid` both work). Unknown names return `None`; the mapper warns
    /// and treats the column as a property.
    pub fn parse(s: &str) -> Option<Role> {
        let folded: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "id" => Some(Role::Id),
            "type" => Some(Role::Type),
            "label" => Some(Role::Label),
            "sourceid" | "source" | "from" => Some(Role::SourceId),
            "targetid" | "target" | "to" => Some(Role::TargetId),
            "date" => Some(Role::Date),
            "property" => Some(Role::Property),
            "ignore" => Some(Role::Ignore),
            _ => None,
        }
    }
}

/// Maps each column name to its role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub columns: BTreeMap<String, Role>,
}

impl RoleAssignment {
    /// Build from raw column→role-name pairs, turning unknown role names into
    /// `Property` with a warning each.
    pub fn from_named(raw: &BTreeMap<String, String>) -> (Self, Vec<Warning>) {
        let mut columns = BTreeMap::new();
        let mut warnings = Vec::new();
        for (column, role_name) in raw {
            match Role::parse(role_name) {
                Some(role) => {
                    columns.insert(column.clone(), role);
                }
                None => {
                    warnings.push(Warning::for_subject(
                        column.clone(),
                        format!("unknown role `{role_name}`, treating column as property"),
                    ));
                    columns.insert(column.clone(), Role::Property);
                }
            }
        }
        (Self { columns }, warnings)
    }

    pub fn role_of(&self, column: &str) -> Option<Role> {
        self.columns.get(column).copied()
    }
}

fn fold(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Heuristic role suggestion from column names and detected types.
pub fn suggest_roles(profiles: &[ColumnProfile]) -> RoleAssignment {
    let mut columns = BTreeMap::new();
    for profile in profiles {
        let folded = fold(&profile.name);
        let role = match folded.as_str() {
            "id" | "uid" => Role::Id,
            "type" | "kind" | "category" => Role::Type,
            "name" | "label" | "title" => Role::Label,
            "from" | "source" | "src" => Role::SourceId,
            "to" | "target" | "dst" => Role::TargetId,
            "date" | "when" | "timestamp" if profile.detected_type == SemanticType::Date => {
                Role::Date
            }
            _ => Role::Property,
        };
        columns.insert(profile.name.clone(), role);
    }
    RoleAssignment { columns }
}

// ============================================================================
// Mapping
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapResult {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub warnings: Vec<Warning>,
}

/// Project rows into raw node/edge candidates using the supplied assignment,
/// or the suggested one when absent.
pub fn map_roles(
    rows: &[TypedRow],
    profiles: &[ColumnProfile],
    assignment: Option<&RoleAssignment>,
) -> MapResult {
    let suggested;
    let assignment = match assignment {
        Some(a) => a,
        None => {
            suggested = suggest_roles(profiles);
            &suggested
        }
    };

    let mut warnings = Vec::new();
    for column in assignment.columns.keys() {
        if !profiles.iter().any(|p| &p.name == column) {
            warnings.push(Warning::for_subject(
                column.clone(),
                "role assigned to a column that does not exist",
            ));
        }
    }

    // Column roles aligned with the profile order. Unassigned columns default
    // to properties.
    let roles: Vec<Role> = profiles
        .iter()
        .map(|p| assignment.role_of(&p.name).unwrap_or(Role::Property))
        .collect();

    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    for (row_index, row) in rows.iter().enumerate() {
        // Several columns may carry the same role (`name` and `label` both
        // suggest Label); the first non-empty cell wins.
        let text_of = |role: Role| -> Option<String> {
            roles
                .iter()
                .zip(row.cells.iter())
                .filter(|(r, _)| **r == role)
                .find_map(|(_, cell)| cell_text(cell))
        };

        let source = text_of(Role::SourceId);
        let target = text_of(Role::TargetId);
        let id = text_of(Role::Id);
        let node_type = text_of(Role::Type);
        let label = text_of(Role::Label);

        let properties = collect_properties(&roles, profiles, row);

        if let (Some(source), Some(target)) = (source, target) {
            let edge_type = node_type
                .or(label)
                .unwrap_or_else(|| "related".to_string());
            edges.push(Edge {
                id: id.unwrap_or_else(|| format!("edge-{row_index}")),
                source,
                target,
                edge_type,
                properties,
                inferred: false,
            });
            continue;
        }

        let node_type = node_type.unwrap_or_else(|| "entity".to_string());
        let id = match id {
            Some(id) => id,
            None => {
                let synthesized =
                    synthesize_id(row_index, &node_type, label.as_deref().unwrap_or(""));
                warnings.push(Warning::for_row(
                    row_index,
                    format!("empty id, synthesized `{synthesized}`"),
                ));
                synthesized
            }
        };
        let label = label.unwrap_or_else(|| id.clone());
        nodes.push(Node {
            id,
            node_type,
            label,
            properties,
            aliases: Vec::new(),
            source_row: Some(row_index),
        });
    }

    MapResult {
        nodes,
        edges,
        warnings,
    }
}

/// Cell text for identity purposes: canonical when valid, raw otherwise,
/// `None` when empty.
fn cell_text(cell: &TypedCell) -> Option<String> {
    if let Some(text) = cell.usable_text() {
        return Some(text);
    }
    let raw = cell.raw.as_text();
    let raw = raw.trim();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

fn collect_properties(roles: &[Role], profiles: &[ColumnProfile], row: &TypedRow) -> PropertyMap {
    let mut properties = PropertyMap::new();
    for ((role, profile), cell) in roles.iter().zip(profiles.iter()).zip(row.cells.iter()) {
        if !matches!(role, Role::Property | Role::Date) {
            continue;
        }
        if cell.raw.is_empty() {
            continue;
        }
        properties.insert(profile.name.clone(), cell.clone());
    }
    properties
}

/// Deterministic id for rows that carry no id value.
fn synthesize_id(row_index: usize, type_text: &str, label_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(row_index.to_le_bytes());
    hasher.update([0u8]);
    hasher.update(type_text.as_bytes());
    hasher.update([0u8]);
    hasher.update(label_text.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
    format!("node-{hex}")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use linkforge_ingest::{ingest, IngestOptions};
    use linkforge_schema::{detect_types, normalize, DetectOptions, RecognizerRegistry};

    fn mapped(blob: &str) -> MapResult {
        let ingested = ingest(blob, None, &IngestOptions::default()).unwrap();
        let registry = RecognizerRegistry::with_defaults();
        let profiles = detect_types(
            &ingested.rows,
            &ingested.headers,
            &registry,
            &DetectOptions::default(),
        );
        let normalized = normalize(&ingested.rows, &profiles, &registry);
        map_roles(&normalized.rows, &profiles, None)
    }

    #[test]
    fn node_and_edge_rows_split() {
        let out = mapped(
            r#"[{"id":"1","name":"Alice","type":"Person"},
                {"id":"2","name":"Bob","type":"Person"},
                {"from":"1","to":"2","label":"knows"}]"#,
        );
        assert_eq!(out.nodes.len(), 2);
        assert_eq!(out.edges.len(), 1);
        assert_eq!(out.edges[0].source, "1");
        assert_eq!(out.edges[0].target, "2");
        assert_eq!(out.edges[0].edge_type, "knows");
    }

    #[test]
    fn duplicate_role_columns_fall_through_to_non_empty_cell() {
        // `name` and `label` both carry Label; node rows fill only `name`,
        // the edge row fills only `label`.
        let out = mapped(
            r#"[{"id":"1","name":"Alice","type":"Person","label":""},
                {"id":"2","name":"Bob","type":"Person","label":""},
                {"from":"1","to":"2","name":"","label":"knows"}]"#,
        );
        assert_eq!(out.nodes.len(), 2);
        assert_eq!(out.nodes[0].label, "Alice");
        assert_eq!(out.edges[0].edge_type, "knows");
    }

    #[test]
    fn ambiguous_row_with_one_endpoint_is_a_node() {
        let out = mapped(r#"[{"id":"1","name":"Alice","from":"9"}]"#);
        assert_eq!(out.nodes.len(), 1);
        assert!(out.edges.is_empty());
    }

    #[test]
    fn ambiguous_row_with_both_endpoints_is_an_edge() {
        let out = mapped(r#"[{"id":"e1","from":"1","to":"2"}]"#);
        assert!(out.nodes.is_empty());
        assert_eq!(out.edges.len(), 1);
        assert_eq!(out.edges[0].id, "e1");
    }

    #[test]
    fn empty_id_is_synthesized_deterministically() {
        let a = mapped(r#"[{"id":"","name":"Alice","type":"Person"}]"#);
        let b = mapped(r#"[{"id":"","name":"Alice","type":"Person"}]"#);
        assert_eq!(a.nodes[0].id, b.nodes[0].id);
        assert!(a.nodes[0].id.starts_with("node-"));
        assert_eq!(a.warnings.len(), 1);
    }

    #[test]
    fn properties_keep_non_role_columns() {
        let out = mapped(r#"[{"id":"1","name":"Alice","email":"a@acme.org","score":"5"}]"#);
        let node = &out.nodes[0];
        assert!(node.properties.contains_key("email"));
        assert!(node.properties.contains_key("score"));
        assert!(!node.properties.contains_key("name"));
    }

    #[test]
    fn suggested_roles_cover_the_alias_table() {
        let profiles: Vec<ColumnProfile> = ["uid", "kind", "title", "src", "dst", "notes"]
            .iter()
            .map(|n| ColumnProfile {
                name: n.to_string(),
                detected_type: SemanticType::String,
                confidence: 0.5,
                sample_values: vec![],
            })
            .collect();
        let assignment = suggest_roles(&profiles);
        assert_eq!(assignment.role_of("uid"), Some(Role::Id));
        assert_eq!(assignment.role_of("kind"), Some(Role::Type));
        assert_eq!(assignment.role_of("title"), Some(Role::Label));
        assert_eq!(assignment.role_of("src"), Some(Role::SourceId));
        assert_eq!(assignment.role_of("dst"), Some(Role::TargetId));
        assert_eq!(assignment.role_of("notes"), Some(Role::Property));
    }

    #[test]
    fn unknown_role_name_becomes_property_with_warning() {
        let mut raw = BTreeMap::new();
        raw.insert("x".to_string(), "wizard".to_string());
        let (assignment, warnings) = RoleAssignment::from_named(&raw);
        assert_eq!(assignment.role_of("x"), Some(Role::Property));
        assert_eq!(warnings.len(), 1);
    }
}
