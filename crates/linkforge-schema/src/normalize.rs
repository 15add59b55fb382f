//! Cell normalization.
//!
//! Applies the winning recognizer's canonicalization to every cell. This
//! stage never raises: a cell that fails to canonicalize keeps its raw value
//! with `valid = false` and a per-row warning. Row count is preserved
//! exactly.

use crate::{CanonicalValue, ColumnProfile, RecognizerRegistry, SemanticType, TypedCell};
use linkforge_ingest::{RawRow, Warning};
use serde::{Deserialize, Serialize};

/// A normalized row: typed cells aligned with the column profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedRow {
    pub cells: Vec<TypedCell>,
}

impl TypedRow {
    pub fn get<'a>(&'a self, profiles: &[ColumnProfile], name: &str) -> Option<&'a TypedCell> {
        let idx = profiles.iter().position(|p| p.name == name)?;
        self.cells.get(idx)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeResult {
    pub rows: Vec<TypedRow>,
    pub warnings: Vec<Warning>,
}

/// Canonicalize every cell per its column's detected type.
pub fn normalize(
    rows: &[RawRow],
    profiles: &[ColumnProfile],
    registry: &RecognizerRegistry,
) -> NormalizeResult {
    let mut warnings = Vec::new();
    let out_rows = rows
        .iter()
        .enumerate()
        .map(|(row_index, row)| normalize_row(row_index, row, profiles, registry, &mut warnings))
        .collect();

    NormalizeResult {
        rows: out_rows,
        warnings,
    }
}

fn normalize_row(
    row_index: usize,
    row: &RawRow,
    profiles: &[ColumnProfile],
    registry: &RecognizerRegistry,
    warnings: &mut Vec<Warning>,
) -> TypedRow {
    let cells = profiles
        .iter()
        .enumerate()
        .map(|(col, profile)| {
            let raw = row
                .values
                .get(col)
                .cloned()
                .unwrap_or(linkforge_ingest::CellValue::Null);
            normalize_cell(row_index, profile, raw, registry, warnings)
        })
        .collect();
    TypedRow { cells }
}

fn normalize_cell(
    row_index: usize,
    profile: &ColumnProfile,
    raw: linkforge_ingest::CellValue,
    registry: &RecognizerRegistry,
    warnings: &mut Vec<Warning>,
) -> TypedCell {
    // Empty cells carry nothing to canonicalize or validate.
    if raw.is_empty() {
        return TypedCell {
            raw,
            canonical: CanonicalValue::Text(String::new()),
            semantic_type: profile.detected_type,
            valid: true,
        };
    }

    let Some(recognizer) = registry.get(profile.detected_type) else {
        // A profile referencing an unregistered type falls back to the raw
        // text rather than dropping the cell.
        warnings.push(Warning::for_row(
            row_index,
            format!(
                "column `{}`: no recognizer registered for {}",
                profile.name, profile.detected_type
            ),
        ));
        let canonical = CanonicalValue::Text(raw.as_text().trim().to_string());
        return TypedCell {
            raw,
            canonical,
            semantic_type: SemanticType::String,
            valid: true,
        };
    };

    match recognizer.canonicalize(&profile.name, &raw) {
        Ok(canonical) => {
            let valid = recognizer.validate(&canonical);
            if !valid {
                warnings.push(Warning::for_row(
                    row_index,
                    format!(
                        "column `{}`: canonical value fails {} validation",
                        profile.name, profile.detected_type
                    ),
                ));
            }
            TypedCell {
                raw,
                canonical,
                semantic_type: profile.detected_type,
                valid,
            }
        }
        Err(message) => {
            warnings.push(Warning::for_row(
                row_index,
                format!("column `{}`: {message}", profile.name),
            ));
            let canonical = CanonicalValue::Text(raw.as_text());
            TypedCell {
                raw,
                canonical,
                semantic_type: profile.detected_type,
                valid: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{detect_types, DetectOptions};
    use linkforge_ingest::{CellValue, RawRow};

    fn setup(headers: &[&str], data: Vec<Vec<&str>>) -> (Vec<RawRow>, Vec<ColumnProfile>, RecognizerRegistry) {
        let rows: Vec<RawRow> = data
            .into_iter()
            .map(|cells| {
                RawRow::new(
                    cells
                        .into_iter()
                        .map(|v| {
                            if v.is_empty() {
                                CellValue::Null
                            } else {
                                CellValue::Text(v.to_string())
                            }
                        })
                        .collect(),
                )
            })
            .collect();
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let registry = RecognizerRegistry::with_defaults();
        let profiles = detect_types(&rows, &headers, &registry, &DetectOptions::default());
        (rows, profiles, registry)
    }

    #[test]
    fn row_count_preserved() {
        let (rows, profiles, registry) = setup(
            &["email"],
            vec![vec!["a@acme.org"], vec!["bad value"], vec![""]],
        );
        let out = normalize(&rows, &profiles, &registry);
        assert_eq!(out.rows.len(), rows.len());
    }

    #[test]
    fn failed_canonicalization_keeps_raw() {
        let (rows, profiles, registry) = setup(
            &["email"],
            vec![vec!["a@acme.org"], vec!["not an email"]],
        );
        let out = normalize(&rows, &profiles, &registry);
        let bad = &out.rows[1].cells[0];
        assert!(!bad.valid);
        assert_eq!(bad.canonical, CanonicalValue::Text("not an email".to_string()));
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].row_index, Some(1));
    }

    #[test]
    fn emails_lowercased() {
        let (rows, profiles, registry) = setup(&["email"], vec![vec!["A@Acme.ORG"]]);
        let out = normalize(&rows, &profiles, &registry);
        assert_eq!(
            out.rows[0].cells[0].canonical,
            CanonicalValue::Text("a@acme.org".to_string())
        );
        assert!(out.rows[0].cells[0].valid);
    }

    #[test]
    fn empty_cells_stay_valid_and_empty() {
        let (rows, profiles, registry) = setup(&["phone"], vec![vec![""]]);
        let out = normalize(&rows, &profiles, &registry);
        let cell = &out.rows[0].cells[0];
        assert!(cell.valid);
        assert!(cell.canonical.is_empty());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn dms_coordinates_normalized() {
        let (rows, profiles, registry) = setup(
            &["coordinates"],
            vec![vec!["40°7'28\"N 74°0'60\"W"]],
        );
        let out = normalize(&rows, &profiles, &registry);
        let cell = &out.rows[0].cells[0];
        assert!(cell.valid);
        match cell.canonical {
            CanonicalValue::Coordinates {
                latitude,
                longitude,
            } => {
                assert!((latitude - 40.1244).abs() < 1e-3);
                assert!((longitude + 74.0167).abs() < 1e-3);
            }
            ref other => panic!("expected coordinates, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_latitude_flagged() {
        let (rows, profiles, registry) = setup(&["latitude"], vec![vec!["95.0"]]);
        let out = normalize(&rows, &profiles, &registry);
        let cell = &out.rows[0].cells[0];
        assert!(!cell.valid);
        assert_eq!(out.warnings.len(), 1);
    }
}
