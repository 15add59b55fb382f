//! Per-column type detection.
//!
//! Confidence for a column is the average per-cell confidence over a sample
//! of rows (default 50), computed independently for every recognizer. The
//! highest average wins; ties break in registry priority order; columns whose
//! best score is below 0.3 are typed `string`.

use crate::{RecognizerRegistry, SemanticType};
use linkforge_ingest::RawRow;
use serde::{Deserialize, Serialize};

const MIN_CONFIDENCE: f64 = 0.3;
const MAX_SAMPLE_VALUES: usize = 5;

#[derive(Debug, Clone)]
pub struct DetectOptions {
    /// Number of rows sampled per column.
    pub sample_rows: usize,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self { sample_rows: 50 }
    }
}

/// Detection result for one column. Produced here, consumed by the
/// normalizer and the role mapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub detected_type: SemanticType,
    pub confidence: f64,
    pub sample_values: Vec<String>,
}

/// Score every column against the registry. Profiles come back in header
/// order, one per column.
pub fn detect_types(
    rows: &[RawRow],
    headers: &[String],
    registry: &RecognizerRegistry,
    options: &DetectOptions,
) -> Vec<ColumnProfile> {
    let profiles: Vec<ColumnProfile> = headers
        .iter()
        .enumerate()
        .map(|(col, name)| profile_column(rows, col, name, registry, options))
        .collect();
    tracing::debug!(columns = profiles.len(), rows = rows.len(), "profiled columns");
    profiles
}

fn profile_column(
    rows: &[RawRow],
    col: usize,
    name: &str,
    registry: &RecognizerRegistry,
    options: &DetectOptions,
) -> ColumnProfile {
    let sample: Vec<&linkforge_ingest::CellValue> = rows
        .iter()
        .take(options.sample_rows)
        .filter_map(|row| row.values.get(col))
        .filter(|cell| !cell.is_empty())
        .collect();

    let mut best_type = SemanticType::String;
    let mut best_score = f64::MIN;

    for (tag, recognizer) in registry.iter() {
        let score = if sample.is_empty() {
            // Nothing but empty cells: the field name is the only signal.
            if recognizer.matches_field_name(name) {
                0.7
            } else {
                0.0
            }
        } else {
            let total: f64 = sample
                .iter()
                .map(|cell| recognizer.confidence(name, cell))
                .sum();
            total / sample.len() as f64
        };

        // Strictly greater: equal scores keep the earlier (higher-priority)
        // type.
        if score > best_score + 1e-9 {
            best_score = score;
            best_type = tag;
        }
    }

    if best_score < MIN_CONFIDENCE {
        best_type = SemanticType::String;
    }

    ColumnProfile {
        name: name.to_string(),
        detected_type: best_type,
        confidence: best_score.max(0.0),
        sample_values: sample
            .iter()
            .take(MAX_SAMPLE_VALUES)
            .map(|cell| cell.as_text())
            .collect(),
    }
}
