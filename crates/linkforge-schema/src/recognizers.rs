//! Built-in recognizers and the registry that composes them.
//!
//! Each recognizer scores a (field name, value) pair:
//! - both name and pattern match → 1.0
//! - name only → 0.7
//! - pattern only → 0.5
//! - neither → 0.0
//!
//! Field-name matching is case-folded and punctuation-stripped against an
//! alias list, so `E_Mail`, `e-mail`, and `email` all hit the email
//! recognizer.

use crate::{CanonicalValue, SemanticType};
use chrono::{NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use linkforge_ingest::CellValue;
use regex::Regex;

// ============================================================================
// Capability record
// ============================================================================

/// The capability record for one semantic type.
pub trait Recognizer {
    /// Case-folded, punctuation-stripped match against known field aliases.
    fn matches_field_name(&self, name: &str) -> bool;

    /// Structured or regex check against the value.
    fn matches_value(&self, value: &CellValue) -> bool;

    /// Combined confidence for one cell.
    fn confidence(&self, name: &str, value: &CellValue) -> f64 {
        match (self.matches_field_name(name), self.matches_value(value)) {
            (true, true) => 1.0,
            (true, false) => 0.7,
            (false, true) => 0.5,
            (false, false) => 0.0,
        }
    }

    /// Produce the canonical form. `Err` means the value could not be
    /// canonicalized; the normalizer then keeps the raw value and marks the
    /// cell invalid.
    fn canonicalize(&self, name: &str, value: &CellValue) -> Result<CanonicalValue, String>;

    /// Post-canonicalization validity check (range invariants).
    fn validate(&self, _canonical: &CanonicalValue) -> bool {
        true
    }
}

/// Lowercase and strip everything but ASCII alphanumerics, so alias matching
/// is robust to `E-Mail` / `phone_number` spellings.
pub fn fold_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn name_in(name: &str, aliases: &[&str]) -> bool {
    let folded = fold_name(name);
    aliases.iter().any(|a| folded == *a)
}

// ============================================================================
// Registry
// ============================================================================

/// Priority-ordered registry of recognizers. The order decides ties during
/// detection; `with_defaults` installs the built-in set in tie-break priority
/// order with the string recognizer as the final fallback.
pub struct RecognizerRegistry {
    entries: Vec<(SemanticType, Box<dyn Recognizer>)>,
}

impl RecognizerRegistry {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(SemanticType::Email, Box::new(EmailRecognizer::new()));
        registry.register(SemanticType::Phone, Box::new(PhoneRecognizer::new()));
        registry.register(
            SemanticType::Coordinates,
            Box::new(CoordinatesRecognizer::new()),
        );
        registry.register(SemanticType::Address, Box::new(AddressRecognizer::new()));
        registry.register(SemanticType::Date, Box::new(DateRecognizer::new()));
        registry.register(SemanticType::Number, Box::new(NumberRecognizer));
        registry.register(SemanticType::String, Box::new(StringRecognizer));
        registry
    }

    /// Register or replace the recognizer for a type. Replacing keeps the
    /// original priority position; new types append.
    pub fn register(&mut self, tag: SemanticType, recognizer: Box<dyn Recognizer>) {
        if let Some(slot) = self.entries.iter_mut().find(|(t, _)| *t == tag) {
            slot.1 = recognizer;
        } else {
            self.entries.push((tag, recognizer));
        }
    }

    pub fn get(&self, tag: SemanticType) -> Option<&dyn Recognizer> {
        self.entries
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, r)| r.as_ref())
    }

    /// Recognizers in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (SemanticType, &dyn Recognizer)> {
        self.entries.iter().map(|(t, r)| (*t, r.as_ref()))
    }
}

impl Default for RecognizerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================================
// Email
// ============================================================================

pub struct EmailRecognizer {
    pattern: Regex,
}

impl EmailRecognizer {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")
                .expect("static regex"),
        }
    }

    fn is_email(&self, text: &str) -> bool {
        let text = text.trim();
        if !text.contains('@') || !self.pattern.is_match(text) {
            return false;
        }
        // Placeholder domains never identify a real subject.
        let domain = text.rsplit('@').next().unwrap_or("").to_ascii_lowercase();
        domain != "example.com" && domain != "test.com"
    }
}

impl Default for EmailRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Recognizer for EmailRecognizer {
    fn matches_field_name(&self, name: &str) -> bool {
        name_in(name, &["email", "mail", "emailaddress"])
    }

    fn matches_value(&self, value: &CellValue) -> bool {
        matches!(value, CellValue::Text(s) if self.is_email(s))
    }

    fn canonicalize(&self, _name: &str, value: &CellValue) -> Result<CanonicalValue, String> {
        let text = value.as_text();
        let trimmed = text.trim();
        if self.is_email(trimmed) {
            Ok(CanonicalValue::Text(trimmed.to_ascii_lowercase()))
        } else {
            Err(format!("`{trimmed}` is not a usable email address"))
        }
    }
}

// ============================================================================
// Phone
// ============================================================================

pub struct PhoneRecognizer;

impl PhoneRecognizer {
    pub fn new() -> Self {
        Self
    }

    fn digits(text: &str) -> String {
        text.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}

impl Recognizer for PhoneRecognizer {
    fn matches_field_name(&self, name: &str) -> bool {
        name_in(
            name,
            &["phone", "tel", "mobile", "cell", "phonenumber", "telephone"],
        )
    }

    fn matches_value(&self, value: &CellValue) -> bool {
        let text = value.as_text();
        if text.trim().is_empty() {
            return false;
        }
        // Only digits plus common phone punctuation, 7-15 digits total.
        if !text
            .chars()
            .all(|c| c.is_ascii_digit() || " +-().".contains(c))
        {
            return false;
        }
        let n = Self::digits(&text).len();
        (7..=15).contains(&n)
    }

    fn canonicalize(&self, _name: &str, value: &CellValue) -> Result<CanonicalValue, String> {
        let text = value.as_text();
        let digits = Self::digits(&text);
        if !(7..=15).contains(&digits.len()) {
            return Err(format!("`{}` has {} digits, not 7-15", text.trim(), digits.len()));
        }
        let formatted = if digits.len() == 10 {
            format!("({}) {}-{}", &digits[0..3], &digits[3..6], &digits[6..10])
        } else if digits.len() == 11 && digits.starts_with('1') {
            format!(
                "+1 ({}) {}-{}",
                &digits[1..4],
                &digits[4..7],
                &digits[7..11]
            )
        } else {
            format!("+{digits}")
        };
        Ok(CanonicalValue::Text(formatted))
    }
}

// ============================================================================
// Coordinates
// ============================================================================

pub struct CoordinatesRecognizer {
    dms_pair: Regex,
    decimal_pair: Regex,
}

impl CoordinatesRecognizer {
    pub fn new() -> Self {
        Self {
            // 40°7'28"N 74°0'60"W — degrees/minutes/seconds with hemisphere.
            dms_pair: Regex::new(
                r#"(?i)^\s*(\d{1,3})°\s*(\d{1,2})'\s*([\d.]+)"\s*([NS])[\s,]+(\d{1,3})°\s*(\d{1,2})'\s*([\d.]+)"\s*([EW])\s*$"#,
            )
            .expect("static regex"),
            decimal_pair: Regex::new(r"^\s*(-?\d{1,3}(?:\.\d+)?)\s*,\s*(-?\d{1,3}(?:\.\d+)?)\s*$")
                .expect("static regex"),
        }
    }

    fn nested_pair(value: &CellValue) -> Option<(f64, f64)> {
        let CellValue::Nested(map) = value else {
            return None;
        };
        let lat = map
            .get("lat")
            .or_else(|| map.get("latitude"))
            .and_then(CellValue::as_f64)?;
        let lng = map
            .get("lng")
            .or_else(|| map.get("lon"))
            .or_else(|| map.get("longitude"))
            .and_then(CellValue::as_f64)?;
        Some((lat, lng))
    }

    fn parse_pair(&self, value: &CellValue) -> Option<(f64, f64)> {
        if let Some(pair) = Self::nested_pair(value) {
            return Some(pair);
        }
        let text = value.as_text();
        if let Some(caps) = self.dms_pair.captures(&text) {
            let lat = dms_to_decimal(&caps[1], &caps[2], &caps[3])?;
            let lng = dms_to_decimal(&caps[5], &caps[6], &caps[7])?;
            let lat = if caps[4].eq_ignore_ascii_case("S") { -lat } else { lat };
            let lng = if caps[8].eq_ignore_ascii_case("W") { -lng } else { lng };
            return Some((lat, lng));
        }
        if let Some(caps) = self.decimal_pair.captures(&text) {
            let lat = caps[1].parse::<f64>().ok()?;
            let lng = caps[2].parse::<f64>().ok()?;
            return Some((lat, lng));
        }
        None
    }

    fn name_is_latitude(name: &str) -> bool {
        let folded = fold_name(name);
        folded.contains("lat")
    }

    fn name_is_longitude(name: &str) -> bool {
        let folded = fold_name(name);
        folded.contains("lng") || folded.contains("lon")
    }
}

impl Default for CoordinatesRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

fn dms_to_decimal(deg: &str, min: &str, sec: &str) -> Option<f64> {
    let d = deg.parse::<f64>().ok()?;
    let m = min.parse::<f64>().ok()?;
    let s = sec.parse::<f64>().ok()?;
    Some(d + m / 60.0 + s / 3600.0)
}

impl Recognizer for CoordinatesRecognizer {
    fn matches_field_name(&self, name: &str) -> bool {
        if name_in(
            name,
            &["lat", "lng", "lon", "latitude", "longitude", "coord", "coordinates", "coords"],
        ) {
            return true;
        }
        Self::name_is_latitude(name) || Self::name_is_longitude(name)
    }

    fn matches_value(&self, value: &CellValue) -> bool {
        // A bare number is never pattern evidence on its own; plenty of
        // numeric columns fall in [-180, 180].
        match self.parse_pair(value) {
            Some((lat, lng)) => lat.abs() <= 90.0 && lng.abs() <= 180.0,
            None => false,
        }
    }

    fn canonicalize(&self, name: &str, value: &CellValue) -> Result<CanonicalValue, String> {
        if let Some((latitude, longitude)) = self.parse_pair(value) {
            return Ok(CanonicalValue::Coordinates {
                latitude,
                longitude,
            });
        }
        // Single lat or lng column: canonical form is the parsed float; the
        // side decides the range check.
        if let Some(v) = value.as_f64() {
            let in_range = if Self::name_is_latitude(name) {
                v.abs() <= 90.0
            } else {
                v.abs() <= 180.0
            };
            if in_range {
                return Ok(CanonicalValue::Number(v));
            }
            return Err(format!("`{v}` is outside the coordinate range for `{name}`"));
        }
        Err(format!("`{}` is not a coordinate", value.as_text().trim()))
    }

    fn validate(&self, canonical: &CanonicalValue) -> bool {
        match canonical {
            CanonicalValue::Coordinates {
                latitude,
                longitude,
            } => latitude.abs() <= 90.0 && longitude.abs() <= 180.0,
            _ => true,
        }
    }
}

// ============================================================================
// Address
// ============================================================================

pub struct AddressRecognizer {
    street_keywords: Regex,
}

impl AddressRecognizer {
    pub fn new() -> Self {
        Self {
            street_keywords: Regex::new(
                r"(?i)\b(street|st|avenue|ave|road|rd|boulevard|blvd|lane|ln|drive|dr|court|ct|place|pl|way|plaza|square|sq|suite|ste|apt|unit)\b\.?",
            )
            .expect("static regex"),
        }
    }
}

impl Default for AddressRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Recognizer for AddressRecognizer {
    fn matches_field_name(&self, name: &str) -> bool {
        name_in(name, &["address", "street", "location", "addr", "streetaddress"])
    }

    fn matches_value(&self, value: &CellValue) -> bool {
        match value {
            CellValue::Text(s) => {
                let s = s.trim();
                s.len() >= 5 && self.street_keywords.is_match(s)
            }
            _ => false,
        }
    }

    fn canonicalize(&self, _name: &str, value: &CellValue) -> Result<CanonicalValue, String> {
        // Addresses pass through; segmentation/geocoding is out of scope.
        Ok(CanonicalValue::Text(value.as_text().trim().to_string()))
    }
}

// ============================================================================
// Date
// ============================================================================

pub struct DateRecognizer;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%b %d, %Y"];

impl DateRecognizer {
    pub fn new() -> Self {
        Self
    }

    fn parse(text: &str) -> Option<chrono::DateTime<Utc>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
            return Some(dt.with_timezone(&Utc));
        }
        for fmt in DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }
        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
                let naive = date.and_hms_opt(0, 0, 0)?;
                return Some(Utc.from_utc_datetime(&naive));
            }
        }
        None
    }
}

impl Recognizer for DateRecognizer {
    fn matches_field_name(&self, name: &str) -> bool {
        name_in(
            name,
            &["date", "when", "timestamp", "datetime", "time", "createdat", "updatedat"],
        )
    }

    fn matches_value(&self, value: &CellValue) -> bool {
        matches!(value, CellValue::Text(s) if Self::parse(s).is_some())
    }

    fn canonicalize(&self, _name: &str, value: &CellValue) -> Result<CanonicalValue, String> {
        let text = value.as_text();
        match Self::parse(&text) {
            Some(dt) => Ok(CanonicalValue::Text(
                dt.to_rfc3339_opts(SecondsFormat::Secs, true),
            )),
            None => Err(format!("`{}` is not a recognizable date", text.trim())),
        }
    }
}

// ============================================================================
// Number / string fallbacks
// ============================================================================

pub struct NumberRecognizer;

impl Recognizer for NumberRecognizer {
    fn matches_field_name(&self, _name: &str) -> bool {
        false
    }

    fn matches_value(&self, value: &CellValue) -> bool {
        match value {
            CellValue::Number(_) => true,
            CellValue::Text(s) => {
                let s = s.trim();
                !s.is_empty() && s.parse::<f64>().is_ok()
            }
            _ => false,
        }
    }

    fn canonicalize(&self, _name: &str, value: &CellValue) -> Result<CanonicalValue, String> {
        value
            .as_f64()
            .map(CanonicalValue::Number)
            .ok_or_else(|| format!("`{}` is not numeric", value.as_text().trim()))
    }
}

pub struct StringRecognizer;

impl Recognizer for StringRecognizer {
    fn matches_field_name(&self, _name: &str) -> bool {
        false
    }

    fn matches_value(&self, value: &CellValue) -> bool {
        matches!(value, CellValue::Text(_))
    }

    fn canonicalize(&self, _name: &str, value: &CellValue) -> Result<CanonicalValue, String> {
        Ok(CanonicalValue::Text(value.as_text().trim().to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn email_scoring_grid() {
        let rec = EmailRecognizer::new();
        let good = CellValue::Text("Bob@Corp.COM".to_string());
        let bad = CellValue::Text("not-an-email".to_string());
        assert_eq!(rec.confidence("email", &good), 1.0);
        assert_eq!(rec.confidence("email", &bad), 0.7);
        assert_eq!(rec.confidence("notes", &good), 0.5);
        assert_eq!(rec.confidence("notes", &bad), 0.0);
    }

    #[test]
    fn email_placeholder_domains_rejected() {
        let rec = EmailRecognizer::new();
        assert!(!rec.matches_value(&CellValue::Text("jane@example.com".to_string())));
        assert!(!rec.matches_value(&CellValue::Text("jane@test.com".to_string())));
        assert!(rec.matches_value(&CellValue::Text("jane@acme.org".to_string())));
    }

    #[test]
    fn email_canonical_lowercases() {
        let rec = EmailRecognizer::new();
        let got = rec
            .canonicalize("email", &CellValue::Text(" X@X.coM ".to_string()))
            .unwrap();
        assert_eq!(got, CanonicalValue::Text("x@x.com".to_string()));
    }

    #[test]
    fn phone_canonical_forms() {
        let rec = PhoneRecognizer::new();
        for raw in ["+1 (415) 555-0100", "4155550100", "(415) 555-0100", "14155550100"] {
            let got = rec
                .canonicalize("phone", &CellValue::Text(raw.to_string()))
                .unwrap();
            let expect = if raw.chars().filter(|c| c.is_ascii_digit()).count() == 11 {
                "+1 (415) 555-0100"
            } else {
                "(415) 555-0100"
            };
            assert_eq!(got, CanonicalValue::Text(expect.to_string()), "raw {raw}");
        }
    }

    #[test]
    fn phone_international_fallback() {
        let rec = PhoneRecognizer::new();
        let got = rec
            .canonicalize("tel", &CellValue::Text("+44 20 7946 0958".to_string()))
            .unwrap();
        assert_eq!(got, CanonicalValue::Text("+442079460958".to_string()));
    }

    #[test]
    fn phone_rejects_wrong_digit_counts() {
        let rec = PhoneRecognizer::new();
        assert!(!rec.matches_value(&CellValue::Text("123456".to_string())));
        assert!(!rec.matches_value(&CellValue::Text("1234567890123456".to_string())));
        assert!(!rec.matches_value(&CellValue::Text("call me maybe".to_string())));
    }

    #[test]
    fn dms_coordinates_parse() {
        let rec = CoordinatesRecognizer::new();
        let cell = CellValue::Text("40°7'28\"N 74°0'60\"W".to_string());
        assert!(rec.matches_value(&cell));
        match rec.canonicalize("coord", &cell).unwrap() {
            CanonicalValue::Coordinates {
                latitude,
                longitude,
            } => {
                assert_relative_eq!(latitude, 40.124444, epsilon = 1e-4);
                assert_relative_eq!(longitude, -74.016666, epsilon = 1e-4);
            }
            other => panic!("expected coordinates, got {other:?}"),
        }
    }

    #[test]
    fn decimal_pair_coordinates() {
        let rec = CoordinatesRecognizer::new();
        let cell = CellValue::Text("40.1244, -74.0167".to_string());
        assert!(rec.matches_value(&cell));
    }

    #[test]
    fn nested_coordinates() {
        let rec = CoordinatesRecognizer::new();
        let mut map = std::collections::BTreeMap::new();
        map.insert("lat".to_string(), CellValue::Number(40.1));
        map.insert("lng".to_string(), CellValue::Number(-74.0));
        let cell = CellValue::Nested(map);
        assert!(rec.matches_value(&cell));
    }

    #[test]
    fn out_of_range_pair_not_a_match() {
        let rec = CoordinatesRecognizer::new();
        let cell = CellValue::Text("140.0, 200.0".to_string());
        assert!(!rec.matches_value(&cell));
    }

    #[test]
    fn single_latitude_range_checked() {
        let rec = CoordinatesRecognizer::new();
        assert!(rec
            .canonicalize("latitude", &CellValue::Number(91.0))
            .is_err());
        assert_eq!(
            rec.canonicalize("latitude", &CellValue::Number(45.0)).unwrap(),
            CanonicalValue::Number(45.0)
        );
    }

    #[test]
    fn address_keywords() {
        let rec = AddressRecognizer::new();
        assert!(rec.matches_value(&CellValue::Text("12 Main Street".to_string())));
        assert!(rec.matches_value(&CellValue::Text("500 Fifth Ave, Suite 900".to_string())));
        assert!(!rec.matches_value(&CellValue::Text("hello world".to_string())));
    }

    #[test]
    fn date_canonical_is_iso_utc() {
        let rec = DateRecognizer::new();
        let got = rec
            .canonicalize("date", &CellValue::Text("2024-01-01".to_string()))
            .unwrap();
        assert_eq!(
            got,
            CanonicalValue::Text("2024-01-01T00:00:00Z".to_string())
        );

        let got = rec
            .canonicalize("date", &CellValue::Text("01/15/2024".to_string()))
            .unwrap();
        assert_eq!(
            got,
            CanonicalValue::Text("2024-01-15T00:00:00Z".to_string())
        );
    }

    #[test]
    fn registry_priority_order() {
        let registry = RecognizerRegistry::with_defaults();
        let order: Vec<SemanticType> = registry.iter().map(|(t, _)| t).collect();
        assert_eq!(
            order,
            vec![
                SemanticType::Email,
                SemanticType::Phone,
                SemanticType::Coordinates,
                SemanticType::Address,
                SemanticType::Date,
                SemanticType::Number,
                SemanticType::String,
            ]
        );
    }

    #[test]
    fn registry_replacement_keeps_position() {
        let mut registry = RecognizerRegistry::with_defaults();
        registry.register(SemanticType::Phone, Box::new(PhoneRecognizer::new()));
        let order: Vec<SemanticType> = registry.iter().map(|(t, _)| t).collect();
        assert_eq!(order[1], SemanticType::Phone);
        assert_eq!(order.len(), 7);
    }
}
