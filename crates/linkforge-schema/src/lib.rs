//! Semantic type detection and normalization for LinkForge
//!
//! Columns arrive untyped; this crate scores each column against a registry
//! of recognizers (email, phone, coordinates, address, date, number, string)
//! using weak signals from both the field name and the cell values, then
//! canonicalizes every cell according to the winning type.
//!
//! A recognizer is a capability record, not a class hierarchy: field-name
//! match, value-pattern match, canonicalization, and validation compose
//! through [`RecognizerRegistry`]. New recognizers are registered by
//! supplying those capabilities.

mod detect;
mod normalize;
pub mod recognizers;

pub use detect::{detect_types, ColumnProfile, DetectOptions};
pub use normalize::{normalize, NormalizeResult, TypedRow};
pub use recognizers::{Recognizer, RecognizerRegistry};

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Semantic types
// ============================================================================

/// The semantic type assigned to a column or cell.
///
/// Tie-breaking between equal-confidence candidates follows the declaration
/// order here, which is also the registry's default priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Email,
    Phone,
    Coordinates,
    Address,
    Date,
    Number,
    String,
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SemanticType::Email => "email",
            SemanticType::Phone => "phone",
            SemanticType::Coordinates => "coordinates",
            SemanticType::Address => "address",
            SemanticType::Date => "date",
            SemanticType::Number => "number",
            SemanticType::String => "string",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Canonical values and typed cells
// ============================================================================

/// Canonical form of a cell after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CanonicalValue {
    Number(f64),
    Coordinates { latitude: f64, longitude: f64 },
    Text(String),
}

impl CanonicalValue {
    /// Comparable text form, used by the resolver for merge keys and shared
    /// attribute values.
    pub fn as_text(&self) -> String {
        match self {
            CanonicalValue::Text(s) => s.clone(),
            CanonicalValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            CanonicalValue::Coordinates {
                latitude,
                longitude,
            } => format!("{latitude},{longitude}"),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CanonicalValue::Text(s) if s.trim().is_empty())
    }
}

/// A cell paired with its canonical form. Normalization never fails hard: on
/// any canonicalization failure the raw value is kept and `valid` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedCell {
    pub raw: linkforge_ingest::CellValue,
    pub canonical: CanonicalValue,
    pub semantic_type: SemanticType,
    pub valid: bool,
}

impl TypedCell {
    /// Canonical text when the cell is valid and non-empty; the resolver's
    /// view of a merge-key attribute.
    pub fn usable_text(&self) -> Option<String> {
        if !self.valid {
            return None;
        }
        let text = self.canonical.as_text();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}
