//! Immutable record model and content fingerprinting
//!
//! A [`Record`] is one ingested document or row: an ordered mapping of field
//! names to typed values plus a stable content [`Fingerprint`]. Records are
//! built once by the ingestion collaborator and never mutated; the engine
//! shares them read-only across scorers.
//!
//! A [`Schema`] describes the fields a batch is expected to carry and is used
//! by the feature extractor to validate presence and type before scoring.

mod fingerprint;
mod schema;

pub use fingerprint::Fingerprint;
pub use schema::{FieldKind, Schema, SchemaField};

use serde::{Deserialize, Serialize};

/// A single typed field value within a record.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// A numeric value.
    Number(f64),

    /// Free-form text.
    Text(String),

    /// A categorical level (a discrete label drawn from some domain).
    Category(String),

    /// An explicit missing-value marker.
    Missing,
}

impl FieldValue {
    /// Returns the [`FieldKind`] this value satisfies, or `None` for [`FieldValue::Missing`].
    #[must_use]
    pub const fn kind(&self) -> Option<FieldKind> {
        match self {
            Self::Number(_) => Some(FieldKind::Number),
            Self::Text(_) => Some(FieldKind::Text),
            Self::Category(_) => Some(FieldKind::Category),
            Self::Missing => None,
        }
    }

    /// Appends a canonical byte rendering of this value to `out`.
    ///
    /// Numbers are rendered via their IEEE-754 bit pattern so that equal
    /// content always produces equal bytes.
    fn canonicalize_into(&self, out: &mut Vec<u8>) {
        match self {
            Self::Number(n) => {
                out.push(b'n');
                out.extend_from_slice(&n.to_bits().to_be_bytes());
            }
            Self::Text(s) => {
                out.push(b't');
                out.extend_from_slice(s.as_bytes());
            }
            Self::Category(s) => {
                out.push(b'c');
                out.extend_from_slice(s.as_bytes());
            }
            Self::Missing => out.push(b'm'),
        }
    }
}

/// One ingested document or row.
///
/// Field order is preserved as supplied by the ingestion collaborator. The
/// fingerprint is computed once at construction over the canonicalized field
/// sequence, so two records with identical content always share a fingerprint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
    fingerprint: Fingerprint,
}

impl Record {
    /// Create a record from an ordered field sequence, computing its fingerprint.
    #[must_use]
    pub fn new(fields: Vec<(String, FieldValue)>) -> Self {
        let fingerprint = Fingerprint::of_fields(&fields);
        Self { fields, fingerprint }
    }

    /// Returns the value of the named field, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Returns the ordered field sequence.
    #[must_use]
    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    /// Returns the stable content fingerprint.
    #[must_use]
    pub const fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record::new(vec![
            ("title".to_string(), FieldValue::Text("Hello world".to_string())),
            ("score".to_string(), FieldValue::Number(4.5)),
            ("tier".to_string(), FieldValue::Category("gold".to_string())),
        ])
    }

    #[test]
    fn get_returns_field_values() {
        let record = sample();
        assert_eq!(record.get("score"), Some(&FieldValue::Number(4.5)));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn identical_content_yields_identical_fingerprints() {
        assert_eq!(sample().fingerprint(), sample().fingerprint());
    }

    #[test]
    fn different_content_yields_different_fingerprints() {
        let a = sample();
        let b = Record::new(vec![("title".to_string(), FieldValue::Text("Hello world!".to_string()))]);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn field_order_is_part_of_identity() {
        let a = Record::new(vec![
            ("x".to_string(), FieldValue::Number(1.0)),
            ("y".to_string(), FieldValue::Number(2.0)),
        ]);
        let b = Record::new(vec![
            ("y".to_string(), FieldValue::Number(2.0)),
            ("x".to_string(), FieldValue::Number(1.0)),
        ]);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn missing_marker_distinct_from_absent_field() {
        let a = Record::new(vec![("x".to_string(), FieldValue::Missing)]);
        let b = Record::new(vec![]);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.get("x"), Some(&FieldValue::Missing));
    }

    #[test]
    fn value_kind_mapping() {
        assert_eq!(FieldValue::Number(1.0).kind(), Some(FieldKind::Number));
        assert_eq!(FieldValue::Text(String::new()).kind(), Some(FieldKind::Text));
        assert_eq!(FieldValue::Category(String::new()).kind(), Some(FieldKind::Category));
        assert_eq!(FieldValue::Missing.kind(), None);
    }

    #[test]
    fn serde_round_trip_preserves_fingerprint() {
        let record = sample();
        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
