//! Entity resolution: dedup pass, endpoint rewrite, implicit link inference.
//!
//! Merge keys, in order: identical id, equal non-empty normalized email,
//! equal normalized phone, then same-type fuzzy label equality. Merging is a
//! disjoint-set union so the outcome does not depend on row order; the
//! canonical representative of a set is the node with the lowest original id
//! under lexicographic order.

use crate::model::{Edge, Graph, Node};
use crate::union_find::UnionFind;
use linkforge_ingest::{CellValue, Warning};
use linkforge_schema::{CanonicalValue, SemanticType, TypedCell};
use serde::{Deserialize, Serialize};
use ahash::{AHashMap, AHashSet};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Fuzzy label merge threshold: Levenshtein distance up to
    /// `max(1, floor(ratio * label_len))` merges two same-type nodes. The
    /// floor of 1 makes very short labels merge aggressively (any two
    /// same-type single-character labels are within distance 1).
    pub fuzzy_ratio: f64,
    /// Attribute keys that produce inferred `shares-<attr>` edges, in
    /// priority order.
    pub linkable: Vec<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            fuzzy_ratio: 0.15,
            linkable: vec![
                "email".to_string(),
                "phone".to_string(),
                "address".to_string(),
            ],
        }
    }
}

/// One entry per pairwise merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRecord {
    pub winner: String,
    pub loser: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResult {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub merge_log: Vec<MergeRecord>,
    pub warnings: Vec<Warning>,
}

impl ResolveResult {
    pub fn into_graph(self) -> Graph {
        Graph::new(self.nodes, self.edges)
    }
}

/// Deduplicate nodes, rewrite edge endpoints, and infer shared-attribute
/// edges.
pub fn resolve(nodes: Vec<Node>, edges: Vec<Edge>, options: &ResolveOptions) -> ResolveResult {
    let mut warnings = Vec::new();

    let (merged_nodes, id_to_canonical, merge_log) = dedup_nodes(nodes, options);
    let rewritten = rewrite_edges(edges, &merged_nodes, &id_to_canonical, &mut warnings);
    let inferred = infer_edges(&merged_nodes, &rewritten, options);

    if merged_nodes.len() == 1 && id_to_canonical.len() > 1 {
        tracing::warn!("entity resolution collapsed every node into one");
        warnings.push(Warning::new(
            "degenerate merge: all nodes collapsed into a single entity",
        ));
    }

    let mut edges = rewritten;
    edges.extend(inferred);

    ResolveResult {
        nodes: merged_nodes,
        edges,
        merge_log,
        warnings,
    }
}

// ============================================================================
// Pass 1: deduplication
// ============================================================================

fn dedup_nodes(
    nodes: Vec<Node>,
    options: &ResolveOptions,
) -> (Vec<Node>, AHashMap<String, String>, Vec<MergeRecord>) {
    let n = nodes.len();
    let mut uf = UnionFind::new(n);
    // Pairs that actually merged, by index. Winner/loser ids are settled only
    // after every union, once the canonical representative is known.
    let mut merged_pairs: Vec<(usize, usize, String)> = Vec::new();

    let mut log_union = |uf: &mut UnionFind, a: usize, b: usize, reason: &str| {
        if uf.union(a, b) {
            merged_pairs.push((a, b, reason.to_string()));
        }
    };

    // Key 0: identical ids always refer to the same entity.
    let mut by_id: AHashMap<&str, usize> = AHashMap::new();
    for (i, node) in nodes.iter().enumerate() {
        match by_id.get(node.id.as_str()) {
            Some(&first) => log_union(&mut uf, first, i, "same id"),
            None => {
                by_id.insert(&node.id, i);
            }
        }
    }

    // Keys 1 and 2: shared normalized email, then phone.
    for semantic in [SemanticType::Email, SemanticType::Phone] {
        let mut by_value: AHashMap<String, usize> = AHashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            let Some(value) = attribute_value(node, semantic) else {
                continue;
            };
            let value = compare_key(semantic, &value);
            match by_value.get(&value) {
                Some(&first) => {
                    let reason = format!("shared {semantic}");
                    log_union(&mut uf, first, i, &reason);
                }
                None => {
                    by_value.insert(value, i);
                }
            }
        }
    }

    // Key 3: same type + fuzzy label match.
    let mut by_type: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, node) in nodes.iter().enumerate() {
        by_type.entry(node.node_type.as_str()).or_default().push(i);
    }
    for group in by_type.values() {
        for (gi, &i) in group.iter().enumerate() {
            for &j in &group[gi + 1..] {
                if uf.same(i, j) {
                    continue;
                }
                if labels_match(&nodes[i].label, &nodes[j].label, options.fuzzy_ratio) {
                    log_union(&mut uf, i, j, "fuzzy label");
                }
            }
        }
    }

    // Canonical representative per set: lowest original id lexicographically.
    let mut canonical_of_root: AHashMap<usize, usize> = AHashMap::new();
    for i in 0..n {
        let root = uf.find(i);
        let entry = canonical_of_root.entry(root).or_insert(i);
        if nodes[i].id < nodes[*entry].id {
            *entry = i;
        }
    }

    let mut id_to_canonical: AHashMap<String, String> = AHashMap::new();
    for i in 0..n {
        let root = uf.find(i);
        let canon = canonical_of_root[&root];
        id_to_canonical.insert(nodes[i].id.clone(), nodes[canon].id.clone());
    }

    // The winner of every merge is the node that actually survives.
    let merge_log: Vec<MergeRecord> = merged_pairs
        .into_iter()
        .map(|(a, b, reason)| {
            let canon = canonical_of_root[&uf.find(a)];
            let loser = if b == canon { a } else { b };
            MergeRecord {
                winner: nodes[canon].id.clone(),
                loser: nodes[loser].id.clone(),
                reason,
            }
        })
        .collect();

    // Emit merged nodes in canonical-id first-appearance order.
    let mut emitted: AHashSet<usize> = AHashSet::new();
    let mut members_of_root: AHashMap<usize, Vec<usize>> = AHashMap::new();
    for i in 0..n {
        members_of_root.entry(uf.find(i)).or_default().push(i);
    }

    let mut merged = Vec::new();
    for i in 0..n {
        let root = uf.find(i);
        if !emitted.insert(root) {
            continue;
        }
        let canon = canonical_of_root[&root];
        let members = &members_of_root[&root];
        merged.push(merge_set(&nodes, canon, members));
    }

    (merged, id_to_canonical, merge_log)
}

/// The node's value for a merge-key attribute: any valid, non-empty property
/// cell of the given semantic type.
fn attribute_value(node: &Node, semantic: SemanticType) -> Option<String> {
    node.properties
        .values()
        .filter(|cell| cell.semantic_type == semantic)
        .find_map(|cell| cell.usable_text())
}

/// Comparison form of an attribute value. Phones compare on their digits, and
/// an 11-digit number with a leading country code 1 matches its 10-digit
/// form; the canonical display text keeps the `+1` prefix regardless.
fn compare_key(semantic: SemanticType, value: &str) -> String {
    if semantic != SemanticType::Phone {
        return value.to_string();
    }
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 11 && digits.starts_with('1') {
        digits[1..].to_string()
    } else {
        digits
    }
}

fn simplify_label(label: &str) -> String {
    let stripped: String = label
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn labels_match(a: &str, b: &str, ratio: f64) -> bool {
    let sa = simplify_label(a);
    let sb = simplify_label(b);
    if sa.is_empty() || sb.is_empty() {
        return false;
    }
    if sa == sb {
        return true;
    }
    let len = sa.chars().count().max(sb.chars().count());
    let threshold = (ratio * len as f64).floor().max(1.0) as usize;
    strsim::levenshtein(&sa, &sb) <= threshold
}

/// Merge a set of duplicate nodes into its canonical representative.
/// Property conflicts keep the representative's value; every displaced value
/// lands in `aliases`.
fn merge_set(nodes: &[Node], canon: usize, members: &[usize]) -> Node {
    let mut out = nodes[canon].clone();
    for &m in members {
        if m == canon {
            continue;
        }
        let loser = &nodes[m];

        let mut alias: BTreeMap<String, String> = BTreeMap::new();
        if loser.id != out.id {
            alias.insert("id".to_string(), loser.id.clone());
        }
        if loser.label != out.label && !loser.label.trim().is_empty() {
            alias.insert("label".to_string(), loser.label.clone());
        }

        for (key, cell) in &loser.properties {
            match out.properties.get(key) {
                None => {
                    out.properties.insert(key.clone(), cell.clone());
                }
                Some(kept) if kept.canonical != cell.canonical => {
                    alias.insert(key.clone(), cell.canonical.as_text());
                }
                Some(_) => {}
            }
        }

        if !alias.is_empty() {
            out.aliases.push(alias);
        }
        out.aliases.extend(loser.aliases.iter().cloned());
    }
    out
}

// ============================================================================
// Edge rewrite
// ============================================================================

fn rewrite_edges(
    edges: Vec<Edge>,
    nodes: &[Node],
    id_to_canonical: &AHashMap<String, String>,
    warnings: &mut Vec<Warning>,
) -> Vec<Edge> {
    let node_ids: AHashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let mut kept: Vec<Edge> = Vec::new();
    let mut self_loop_types: AHashMap<String, AHashSet<String>> = AHashMap::new();

    for mut edge in edges {
        if let Some(canon) = id_to_canonical.get(&edge.source) {
            edge.source = canon.clone();
        }
        if let Some(canon) = id_to_canonical.get(&edge.target) {
            edge.target = canon.clone();
        }

        if !node_ids.contains(edge.source.as_str()) || !node_ids.contains(edge.target.as_str()) {
            warnings.push(Warning::for_subject(
                edge.id.clone(),
                format!(
                    "dangling edge dropped ({} -> {})",
                    edge.source, edge.target
                ),
            ));
            continue;
        }

        if edge.source == edge.target {
            // Collapsed endpoints: keep one self-loop per distinct type.
            let types = self_loop_types.entry(edge.source.clone()).or_default();
            if !types.insert(edge.edge_type.clone()) {
                warnings.push(Warning::for_subject(
                    edge.id.clone(),
                    "self-loop dropped after merge collapsed its endpoints",
                ));
                continue;
            }
        }

        kept.push(edge);
    }

    kept
}

// ============================================================================
// Pass 2: implicit link inference
// ============================================================================

fn infer_edges(nodes: &[Node], existing: &[Edge], options: &ResolveOptions) -> Vec<Edge> {
    // Guard set: pairs already connected by any existing edge.
    let mut connected: AHashSet<(String, String)> = AHashSet::new();
    for edge in existing {
        connected.insert(pair_key(&edge.source, &edge.target));
    }

    let mut inferred = Vec::new();
    let mut counter = 0usize;

    for attr in &options.linkable {
        let semantic = semantic_for_attr(attr);
        // Shared-value groups keyed by comparison form, in node insertion
        // order; the first display value seen labels the edge.
        let mut by_value: BTreeMap<String, (String, Vec<usize>)> = BTreeMap::new();
        for (i, node) in nodes.iter().enumerate() {
            let value = match semantic {
                Some(s) => attribute_value(node, s),
                None => node
                    .properties
                    .get(attr)
                    .and_then(|cell: &TypedCell| cell.usable_text()),
            };
            if let Some(value) = value {
                let key = match semantic {
                    Some(s) => compare_key(s, &value),
                    None => value.clone(),
                };
                let entry = by_value.entry(key).or_insert_with(|| (value, Vec::new()));
                entry.1.push(i);
            }
        }

        for (value, group) in by_value.values() {
            for (gi, &i) in group.iter().enumerate() {
                for &j in &group[gi + 1..] {
                    let key = pair_key(&nodes[i].id, &nodes[j].id);
                    if !connected.insert(key) {
                        continue;
                    }
                    counter += 1;
                    inferred.push(shared_attr_edge(
                        counter,
                        attr,
                        value,
                        &nodes[i].id,
                        &nodes[j].id,
                        semantic,
                    ));
                }
            }
        }
    }

    inferred
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

fn semantic_for_attr(attr: &str) -> Option<SemanticType> {
    match attr {
        "email" => Some(SemanticType::Email),
        "phone" => Some(SemanticType::Phone),
        "address" => Some(SemanticType::Address),
        _ => None,
    }
}

fn shared_attr_edge(
    n: usize,
    attr: &str,
    value: &str,
    source: &str,
    target: &str,
    semantic: Option<SemanticType>,
) -> Edge {
    let mut properties = crate::model::PropertyMap::new();
    properties.insert(
        attr.to_string(),
        TypedCell {
            raw: CellValue::Text(value.to_string()),
            canonical: CanonicalValue::Text(value.to_string()),
            semantic_type: semantic.unwrap_or(SemanticType::String),
            valid: true,
        },
    );
    Edge {
        id: format!("shares-{attr}-{n}"),
        source: source.to_string(),
        target: target.to_string(),
        edge_type: format!("shares-{attr}"),
        properties,
        inferred: true,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use linkforge_ingest::CellValue;

    fn cell(semantic: SemanticType, text: &str) -> TypedCell {
        TypedCell {
            raw: CellValue::Text(text.to_string()),
            canonical: CanonicalValue::Text(text.to_string()),
            semantic_type: semantic,
            valid: true,
        }
    }

    fn node(id: &str, node_type: &str, label: &str) -> Node {
        Node {
            id: id.to_string(),
            node_type: node_type.to_string(),
            label: label.to_string(),
            properties: Default::default(),
            aliases: Vec::new(),
            source_row: None,
        }
    }

    fn node_with(id: &str, node_type: &str, label: &str, key: &str, c: TypedCell) -> Node {
        let mut n = node(id, node_type, label);
        n.properties.insert(key.to_string(), c);
        n
    }

    fn edge(id: &str, s: &str, t: &str, ty: &str) -> Edge {
        Edge {
            id: id.to_string(),
            source: s.to_string(),
            target: t.to_string(),
            edge_type: ty.to_string(),
            properties: Default::default(),
            inferred: false,
        }
    }

    #[test]
    fn merge_by_email_keeps_lowest_id_and_aliases_loser() {
        let nodes = vec![
            node_with("b", "Person", "Bobby", "email", cell(SemanticType::Email, "x@x.com")),
            node_with("a", "Person", "Roberta", "email", cell(SemanticType::Email, "x@x.com")),
        ];
        let out = resolve(nodes, vec![], &ResolveOptions::default());
        assert_eq!(out.nodes.len(), 1);
        assert_eq!(out.nodes[0].id, "a");
        assert!(out.nodes[0]
            .aliases
            .iter()
            .any(|alias| alias.get("id").map(String::as_str) == Some("b")));
        assert_eq!(out.merge_log.len(), 1);
    }

    #[test]
    fn fuzzy_label_merge_same_type_only() {
        let nodes = vec![
            node("1", "Person", "John Smith"),
            node("2", "Person", "john  smith."),
            node("3", "Company", "John Smith"),
        ];
        let out = resolve(nodes, vec![], &ResolveOptions::default());
        assert_eq!(out.nodes.len(), 2);
        let ids: Vec<&str> = out.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn levenshtein_threshold_scales_with_length() {
        // 20 chars, ratio 0.15 → distance up to 3 merges.
        let nodes = vec![
            node("1", "Person", "Christopher Robinson"),
            node("2", "Person", "Christopher Robphson"),
        ];
        let out = resolve(nodes, vec![], &ResolveOptions::default());
        assert_eq!(out.nodes.len(), 1);

        let nodes = vec![node("1", "Person", "Ann"), node("2", "Person", "Bob")];
        let out = resolve(nodes, vec![], &ResolveOptions::default());
        assert_eq!(out.nodes.len(), 2);
    }

    #[test]
    fn merge_log_names_surviving_node_as_winner() {
        // Union order sees `b` first, but the canonical representative is `a`.
        let nodes = vec![
            node_with("b", "Person", "Bobby", "email", cell(SemanticType::Email, "x@x.com")),
            node_with("a", "Person", "Roberta", "email", cell(SemanticType::Email, "x@x.com")),
        ];
        let out = resolve(nodes, vec![], &ResolveOptions::default());
        assert_eq!(out.nodes[0].id, "a");
        assert_eq!(out.merge_log[0].winner, "a");
        assert_eq!(out.merge_log[0].loser, "b");
    }

    #[test]
    fn edges_rewritten_to_canonical_ids() {
        // Labels are long enough that only the shared email merges anything;
        // short labels would fall inside the distance-1 fuzzy floor.
        let nodes = vec![
            node_with("a", "Person", "Alice Anderson", "email", cell(SemanticType::Email, "x@x.com")),
            node_with("b", "Person", "Bob Brown", "email", cell(SemanticType::Email, "x@x.com")),
            node("c", "Person", "Carol Chen"),
        ];
        let edges = vec![edge("e1", "b", "c", "knows")];
        let out = resolve(nodes, edges, &ResolveOptions::default());
        assert_eq!(out.edges.len(), 1);
        assert_eq!(out.edges[0].source, "a");
        assert_eq!(out.edges[0].target, "c");
    }

    #[test]
    fn dangling_edge_dropped_with_warning() {
        let nodes = vec![node("a", "Person", "A")];
        let edges = vec![edge("e1", "a", "ghost", "knows")];
        let out = resolve(nodes, edges, &ResolveOptions::default());
        assert!(out.edges.is_empty());
        assert!(out
            .warnings
            .iter()
            .any(|w| w.subject.as_deref() == Some("e1")));
    }

    #[test]
    fn collapsed_self_loops_dropped_unless_new_type() {
        let nodes = vec![
            node_with("a", "Person", "A", "email", cell(SemanticType::Email, "x@x.com")),
            node_with("b", "Person", "B", "email", cell(SemanticType::Email, "x@x.com")),
        ];
        let edges = vec![
            edge("e1", "a", "b", "knows"),
            edge("e2", "b", "a", "knows"),
            edge("e3", "a", "b", "mentors"),
        ];
        let out = resolve(nodes, edges, &ResolveOptions::default());
        // One loop per distinct type survives.
        let types: Vec<&str> = out
            .edges
            .iter()
            .filter(|e| !e.inferred)
            .map(|e| e.edge_type.as_str())
            .collect();
        assert_eq!(types, vec!["knows", "mentors"]);
    }

    #[test]
    fn shared_phone_infers_edge() {
        let phone = cell(SemanticType::Phone, "(415) 555-0100");
        let nodes = vec![
            node_with("a", "Person", "A", "phone", phone.clone()),
            node_with("b", "Person", "B", "phone", phone),
        ];
        // Different labels/types... same type here, different labels: ensure
        // they are not fuzzy-merged first.
        let nodes = vec![
            Node { node_type: "Person".into(), ..nodes[0].clone() },
            Node { node_type: "Company".into(), ..nodes[1].clone() },
        ];
        let out = resolve(nodes, vec![], &ResolveOptions::default());
        // Shared phone is a merge key, so they merge instead of linking.
        assert_eq!(out.nodes.len(), 1);
    }

    #[test]
    fn phone_merge_ignores_leading_country_code() {
        let nodes = vec![
            node_with("a", "Person", "Alice Anderson", "phone", cell(SemanticType::Phone, "(415) 555-0100")),
            node_with("b", "Person", "Bob Brown", "phone", cell(SemanticType::Phone, "+1 (415) 555-0100")),
        ];
        let out = resolve(nodes, vec![], &ResolveOptions::default());
        assert_eq!(out.nodes.len(), 1);
        assert_eq!(out.nodes[0].id, "a");
        assert_eq!(out.merge_log[0].reason, "shared phone");
    }

    #[test]
    fn shared_address_infers_edge_not_merge() {
        let addr = cell(SemanticType::Address, "12 Main St");
        let nodes = vec![
            node_with("a", "Person", "Alice", "address", addr.clone()),
            node_with("b", "Person", "Bob", "address", addr),
        ];
        let out = resolve(nodes, vec![], &ResolveOptions::default());
        assert_eq!(out.nodes.len(), 2);
        assert_eq!(out.edges.len(), 1);
        let e = &out.edges[0];
        assert!(e.inferred);
        assert_eq!(e.edge_type, "shares-address");
        assert_eq!(e.properties["address"].canonical.as_text(), "12 Main St");
    }

    #[test]
    fn explicit_edge_suppresses_inference() {
        let addr = cell(SemanticType::Address, "12 Main St");
        let nodes = vec![
            node_with("a", "Person", "Alice", "address", addr.clone()),
            node_with("b", "Person", "Bob", "address", addr),
        ];
        let edges = vec![edge("e1", "a", "b", "knows")];
        let out = resolve(nodes, edges, &ResolveOptions::default());
        assert_eq!(out.edges.len(), 1);
        assert!(!out.edges[0].inferred);
    }

    #[test]
    fn degenerate_merge_warns_but_succeeds() {
        let e = cell(SemanticType::Email, "x@x.com");
        let nodes = vec![
            node_with("a", "Person", "A", "email", e.clone()),
            node_with("b", "Person", "B", "email", e.clone()),
            node_with("c", "Person", "C", "email", e),
        ];
        let out = resolve(nodes, vec![], &ResolveOptions::default());
        assert_eq!(out.nodes.len(), 1);
        assert!(out
            .warnings
            .iter()
            .any(|w| w.message.contains("degenerate")));
    }

    #[test]
    fn resolve_is_idempotent() {
        let addr = cell(SemanticType::Address, "12 Main St");
        let nodes = vec![
            node_with("a", "Person", "Alice", "address", addr.clone()),
            node_with("b", "Person", "Bob", "address", addr),
            node("c", "Person", "Carol"),
        ];
        let edges = vec![edge("e1", "a", "c", "knows")];
        let once = resolve(nodes, edges, &ResolveOptions::default());
        let twice = resolve(
            once.nodes.clone(),
            once.edges.clone(),
            &ResolveOptions::default(),
        );
        assert_eq!(once.nodes, twice.nodes);
        assert_eq!(once.edges, twice.edges);
    }
}
