//! Tabular ingestion for LinkForge
//!
//! Turns a decoded text blob (CSV, TSV, or JSON) into an ordered sequence of
//! row records plus the column header list. The caller supplies the decoded
//! text; this crate is synchronous and pure.
//!
//! Format handling:
//! - explicit `csv|tsv|json`, or content sniffing (JSON iff the first
//!   non-whitespace byte is `[` or `{`, else delimited; a tab in the header
//!   line selects TSV)
//! - delimited input: first non-empty row is the header, quoted fields
//!   preserve embedded delimiters, `""` escapes a quote
//! - JSON input: an array of objects, or an `{entities: [...], links: [...]}`
//!   envelope
//!
//! Uneven column counts are tolerated up to a configurable fraction of data
//! rows (short rows padded, long rows truncated, each with a warning); beyond
//! the tolerance ingestion fails with a parse error.

mod delimited;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Cells and rows
// ============================================================================

/// A single cell value as produced by ingestion.
///
/// Delimited input only ever yields `Null` (empty field) or `Text`; JSON input
/// can carry the full set, including nested objects (used by the coordinates
/// recognizer for `{lat, lng}` pairs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Nested(BTreeMap<String, CellValue>),
}

impl CellValue {
    /// True for `Null` and for text that is empty after trimming.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Display form used by recognizers and labels. Nested values render as
    /// compact JSON; `Null` renders as the empty string.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
            CellValue::Nested(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// One ingested row: cell values aligned with the header list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub values: Vec<CellValue>,
}

impl RawRow {
    pub fn new(values: Vec<CellValue>) -> Self {
        Self { values }
    }

    /// Look up a cell by column name, given the header list this row was
    /// ingested against.
    pub fn get<'a>(&'a self, headers: &[String], name: &str) -> Option<&'a CellValue> {
        let idx = headers.iter().position(|h| h == name)?;
        self.values.get(idx)
    }
}

// ============================================================================
// Warnings and errors
// ============================================================================

/// A recoverable problem attached to a stage result and carried downstream.
///
/// Every dropped row or edge produces one of these referencing its source row
/// index or edge id; no stage silently discards data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Warning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            row_index: None,
            subject: None,
        }
    }

    pub fn for_row(row_index: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            row_index: Some(row_index),
            subject: None,
        }
    }

    pub fn for_subject(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            row_index: None,
            subject: Some(subject.into()),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.row_index, &self.subject) {
            (Some(row), _) => write!(f, "row {}: {}", row, self.message),
            (None, Some(subject)) => write!(f, "{}: {}", subject, self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

/// Fatal ingestion failures. These abort the pipeline; recoverable problems
/// become [`Warning`]s instead.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("input is empty")]
    EmptyInput,

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported format `{0}` (expected csv|tsv|json)")]
    UnknownFormat(String),
}

// ============================================================================
// Formats and options
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Csv,
    Tsv,
    Json,
}

impl FromStr for Format {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "tsv" => Ok(Format::Tsv),
            "json" => Ok(Format::Json),
            other => Err(IngestError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Fraction of data rows allowed to have an uneven column count before
    /// ingestion fails with a parse error.
    pub ragged_row_tolerance: f64,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            ragged_row_tolerance: 0.2,
        }
    }
}

/// Ingestion output: ordered rows, the header list, and recoverable warnings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    pub warnings: Vec<Warning>,
}

// ============================================================================
// Entry point
// ============================================================================

/// Parse a text blob into rows. When `format` is `None` the content is
/// sniffed: JSON if it begins with `[` or `{`, else delimited.
pub fn ingest(
    blob: &str,
    format: Option<Format>,
    options: &IngestOptions,
) -> Result<IngestResult, IngestError> {
    let trimmed = blob.trim_start();
    if trimmed.trim().is_empty() {
        return Err(IngestError::EmptyInput);
    }

    let format = format.unwrap_or_else(|| sniff_format(trimmed));
    tracing::debug!(?format, bytes = blob.len(), "ingesting input");
    match format {
        Format::Json => ingest_json(trimmed),
        Format::Csv => ingest_delimited(blob, ',', options),
        Format::Tsv => ingest_delimited(blob, '\t', options),
    }
}

fn sniff_format(trimmed: &str) -> Format {
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return Format::Json;
    }
    let first_line = trimmed.lines().next().unwrap_or("");
    if first_line.contains('\t') {
        Format::Tsv
    } else {
        Format::Csv
    }
}

// ============================================================================
// Delimited (CSV/TSV)
// ============================================================================

fn ingest_delimited(
    blob: &str,
    delim: char,
    options: &IngestOptions,
) -> Result<IngestResult, IngestError> {
    let mut warnings = Vec::new();
    let mut headers: Option<Vec<String>> = None;
    let mut rows: Vec<RawRow> = Vec::new();
    let mut ragged = 0usize;

    for (line_no, line) in blob.lines().enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            continue;
        }

        let fields = delimited::parse_record(line, delim).map_err(|message| {
            IngestError::Parse {
                line: line_no + 1,
                message,
            }
        })?;

        if headers.is_none() {
            headers = Some(fields.iter().map(|f| f.trim().to_string()).collect());
            continue;
        }
        let width = headers.as_ref().map(|h| h.len()).unwrap_or(0);

        let row_index = rows.len();
        let mut values: Vec<CellValue> = fields
            .into_iter()
            .map(|f| {
                if f.is_empty() {
                    CellValue::Null
                } else {
                    CellValue::Text(f)
                }
            })
            .collect();

        if values.len() < width {
            ragged += 1;
            warnings.push(Warning::for_row(
                row_index,
                format!(
                    "short row: {} of {} columns, padded with nulls",
                    values.len(),
                    width
                ),
            ));
            values.resize(width, CellValue::Null);
        } else if values.len() > width {
            ragged += 1;
            warnings.push(Warning::for_row(
                row_index,
                format!(
                    "long row: {} of {} columns, extra cells dropped",
                    values.len(),
                    width
                ),
            ));
            values.truncate(width);
        }

        rows.push(RawRow::new(values));
    }

    let headers = headers.ok_or(IngestError::EmptyInput)?;

    if !rows.is_empty() {
        let ratio = ragged as f64 / rows.len() as f64;
        if ratio > options.ragged_row_tolerance {
            return Err(IngestError::Parse {
                line: 0,
                message: format!(
                    "{ragged} of {} rows have uneven column counts (tolerance {:.0}%)",
                    rows.len(),
                    options.ragged_row_tolerance * 100.0
                ),
            });
        }
    }

    Ok(IngestResult {
        headers,
        rows,
        warnings,
    })
}

// ============================================================================
// JSON
// ============================================================================

fn ingest_json(blob: &str) -> Result<IngestResult, IngestError> {
    let value: serde_json::Value = serde_json::from_str(blob)?;

    let records: Vec<serde_json::Value> = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut obj) => {
            // `{entities: [...], links: [...]}` envelope: entities first, then
            // link rows (which carry their own from/to columns).
            let entities = obj.remove("entities");
            let links = obj.remove("links");
            if entities.is_none() && links.is_none() {
                return Err(IngestError::Parse {
                    line: 1,
                    message: "expected an array of objects or an entities/links envelope"
                        .to_string(),
                });
            }
            let mut items = Vec::new();
            for part in [entities, links].into_iter().flatten() {
                match part {
                    serde_json::Value::Array(more) => items.extend(more),
                    other => {
                        return Err(IngestError::Parse {
                            line: 1,
                            message: format!(
                                "envelope sections must be arrays, got {}",
                                json_kind(&other)
                            ),
                        })
                    }
                }
            }
            items
        }
        other => {
            return Err(IngestError::Parse {
                line: 1,
                message: format!("expected a JSON array, got {}", json_kind(&other)),
            })
        }
    };

    if records.is_empty() {
        return Err(IngestError::EmptyInput);
    }

    // Header list: union of keys in first-appearance order.
    let mut headers: Vec<String> = Vec::new();
    let mut warnings = Vec::new();
    let mut objects: Vec<serde_json::Map<String, serde_json::Value>> = Vec::new();

    for (idx, record) in records.into_iter().enumerate() {
        match record {
            serde_json::Value::Object(obj) => {
                for key in obj.keys() {
                    if !headers.iter().any(|h| h == key) {
                        headers.push(key.clone());
                    }
                }
                objects.push(obj);
            }
            other => {
                warnings.push(Warning::for_row(
                    idx,
                    format!("record is {}, not an object; skipped", json_kind(&other)),
                ));
            }
        }
    }

    let rows = objects
        .into_iter()
        .map(|mut obj| {
            let values = headers
                .iter()
                .map(|h| obj.remove(h).map(json_to_cell).unwrap_or(CellValue::Null))
                .collect();
            RawRow::new(values)
        })
        .collect();

    Ok(IngestResult {
        headers,
        rows,
        warnings,
    })
}

fn json_to_cell(value: serde_json::Value) -> CellValue {
    match value {
        serde_json::Value::Null => CellValue::Null,
        serde_json::Value::Bool(b) => CellValue::Bool(b),
        serde_json::Value::Number(n) => n
            .as_f64()
            .map(CellValue::Number)
            .unwrap_or(CellValue::Null),
        serde_json::Value::String(s) => CellValue::Text(s),
        serde_json::Value::Object(obj) => CellValue::Nested(
            obj.into_iter()
                .map(|(k, v)| (k, json_to_cell(v)))
                .collect(),
        ),
        // Arrays have no tabular meaning; keep the text so nothing is lost.
        arr @ serde_json::Value::Array(_) => CellValue::Text(arr.to_string()),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_header_and_rows() {
        let blob = "id,name,type\n1,Alice,Person\n2,Bob,Person\n";
        let out = ingest(blob, Some(Format::Csv), &IngestOptions::default()).unwrap();
        assert_eq!(out.headers, vec!["id", "name", "type"]);
        assert_eq!(out.rows.len(), 2);
        assert_eq!(
            out.rows[0].get(&out.headers, "name"),
            Some(&CellValue::Text("Alice".to_string()))
        );
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn quoted_fields_preserve_delimiters() {
        let blob = "id,address\n1,\"12 Main St, Springfield\"\n";
        let out = ingest(blob, Some(Format::Csv), &IngestOptions::default()).unwrap();
        assert_eq!(
            out.rows[0].get(&out.headers, "address"),
            Some(&CellValue::Text("12 Main St, Springfield".to_string()))
        );
    }

    #[test]
    fn doubled_quote_escapes() {
        let blob = "id,name\n1,\"Acme \"\"Corp\"\"\"\n";
        let out = ingest(blob, Some(Format::Csv), &IngestOptions::default()).unwrap();
        assert_eq!(
            out.rows[0].get(&out.headers, "name"),
            Some(&CellValue::Text("Acme \"Corp\"".to_string()))
        );
    }

    #[test]
    fn malformed_quoting_is_fatal() {
        let blob = "id,name\n1,\"unterminated\n";
        let err = ingest(blob, Some(Format::Csv), &IngestOptions::default()).unwrap_err();
        assert!(matches!(err, IngestError::Parse { .. }));
    }

    #[test]
    fn short_rows_padded_with_warning() {
        let blob = "a,b,c\n1,2,3\n4,5,6\n7,8,9\n10,11,12\n13,14\n";
        let out = ingest(blob, Some(Format::Csv), &IngestOptions::default()).unwrap();
        assert_eq!(out.rows.len(), 5);
        assert_eq!(out.rows[4].values[2], CellValue::Null);
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].row_index, Some(4));
    }

    #[test]
    fn too_many_ragged_rows_is_fatal() {
        let blob = "a,b,c\n1,2\n3,4\n";
        let err = ingest(blob, Some(Format::Csv), &IngestOptions::default()).unwrap_err();
        assert!(matches!(err, IngestError::Parse { .. }));
    }

    #[test]
    fn tsv_sniffed_from_header_tab() {
        let blob = "id\tname\n1\tAlice\n";
        let out = ingest(blob, None, &IngestOptions::default()).unwrap();
        assert_eq!(out.headers, vec!["id", "name"]);
        assert_eq!(out.rows.len(), 1);
    }

    #[test]
    fn json_array_of_objects() {
        let blob = r#"[{"id":"1","name":"Alice"},{"id":"2","name":"Bob","extra":true}]"#;
        let out = ingest(blob, None, &IngestOptions::default()).unwrap();
        assert_eq!(out.headers, vec!["id", "name", "extra"]);
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.rows[0].values[2], CellValue::Null);
        assert_eq!(out.rows[1].values[2], CellValue::Bool(true));
    }

    #[test]
    fn json_envelope_entities_then_links() {
        let blob = r#"{"entities":[{"id":"1","name":"Alice"}],"links":[{"from":"1","to":"2"}]}"#;
        let out = ingest(blob, None, &IngestOptions::default()).unwrap();
        assert_eq!(out.rows.len(), 2);
        assert!(out.headers.contains(&"from".to_string()));
        assert!(out.headers.contains(&"to".to_string()));
    }

    #[test]
    fn json_nested_object_kept() {
        let blob = r#"[{"id":"1","coord":{"lat":40.1,"lng":-74.0}}]"#;
        let out = ingest(blob, None, &IngestOptions::default()).unwrap();
        match out.rows[0].get(&out.headers, "coord") {
            Some(CellValue::Nested(map)) => {
                assert_eq!(map.get("lat"), Some(&CellValue::Number(40.1)));
            }
            other => panic!("expected nested cell, got {other:?}"),
        }
    }

    #[test]
    fn non_object_record_skipped_with_warning() {
        let blob = r#"[{"id":"1"}, 42]"#;
        let out = ingest(blob, None, &IngestOptions::default()).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].row_index, Some(1));
    }

    #[test]
    fn empty_input_rejected() {
        assert!(matches!(
            ingest("   \n ", None, &IngestOptions::default()),
            Err(IngestError::EmptyInput)
        ));
        assert!(matches!(
            ingest("[]", None, &IngestOptions::default()),
            Err(IngestError::EmptyInput)
        ));
    }
}
