//! Feature extraction from record fields
//!
//! The [`Extractor`] derives a [`FeatureVector`] from one [`Record`] under a
//! batch [`Schema`]. Extraction is a pure function of record content and the
//! static [`ExtractionConfig`], which is what makes the downstream computation
//! cache sound: equal fingerprints always extract to equal feature vectors.
//!
//! # Implementation Model
//!
//! Each schema field contributes features by kind:
//! - **Number** fields pass through as a numeric feature under the field name.
//! - **Category** fields pass through as a categorical feature.
//! - **Text** fields expand into text statistics (`<field>.chars`,
//!   `<field>.words`, `<field>.sentences`, `<field>.avg_sentence_length`,
//!   `<field>.avg_syllables_per_word`) plus the token sequence
//!   (`<field>.tokens`) for lexicon-style scorers.
//!
//! Extraction is lenient: a missing required field or a type mismatch becomes
//! an [`ExtractionIssue`] attached to the record's eventual report, and the
//! remaining fields still extract. Scorers that depend on an absent feature
//! fail individually; the record as a whole keeps scoring.

mod syllables;
mod text_stats;

pub use text_stats::TextStats;

use crate::record::{FieldKind, FieldValue, Fingerprint, Record, Schema};
use serde::{Deserialize, Serialize};
use strum::Display;

const LOG_TARGET: &str = "   extract";

/// A single derived feature value.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureValue {
    /// A numeric feature.
    Number(f64),

    /// A categorical feature.
    Category(String),

    /// A token sequence derived from a text field, consumed by lexicon scorers.
    Tokens(Vec<String>),
}

/// The features derived from exactly one record.
///
/// Carries the source record's fingerprint for traceability and cache keying.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FeatureVector {
    fingerprint: Fingerprint,
    values: Vec<(String, FeatureValue)>,
}

impl FeatureVector {
    #[must_use]
    pub const fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Returns the ordered feature sequence.
    #[must_use]
    pub fn values(&self) -> &[(String, FeatureValue)] {
        &self.values
    }

    /// Looks up a feature by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Returns the named feature as a number, if present and numeric.
    #[must_use]
    pub fn number(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(FeatureValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Returns the named feature as a categorical level, if present.
    #[must_use]
    pub fn category(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(FeatureValue::Category(level)) => Some(level),
            _ => None,
        }
    }

    /// Returns the named feature as a token sequence, if present.
    #[must_use]
    pub fn tokens(&self, name: &str) -> Option<&[String]> {
        match self.get(name) {
            Some(FeatureValue::Tokens(tokens)) => Some(tokens),
            _ => None,
        }
    }
}

/// Why a field failed to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A required field is absent or carries the missing marker.
    MissingField,

    /// The field's value does not match its declared kind.
    WrongKind,
}

/// A record-scoped extraction failure, surfaced on the record's report.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExtractionIssue {
    pub field: String,
    pub kind: IssueKind,
    pub message: String,
}

/// Static text-processing configuration for the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ExtractionConfig {
    /// Keep original casing when tokenizing text fields.
    pub case_sensitive: bool,

    /// Replace hyphens with spaces before tokenizing, splitting compounds
    /// like `state-of-the-art` into separate tokens.
    pub normalize_hyphens: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            normalize_hyphens: true,
        }
    }
}

/// Derives feature vectors from records under a batch schema.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractionConfig,
}

impl Extractor {
    #[must_use]
    pub const fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Extracts features for one record.
    ///
    /// Never fails as a whole: per-field problems are returned as issues and
    /// the remaining schema fields still extract.
    #[must_use]
    pub fn extract(&self, record: &Record, schema: &Schema) -> (FeatureVector, Vec<ExtractionIssue>) {
        let mut values = Vec::new();
        let mut issues = Vec::new();

        for field in schema.fields() {
            match record.get(&field.name) {
                None | Some(FieldValue::Missing) => {
                    if field.required {
                        issues.push(ExtractionIssue {
                            field: field.name.clone(),
                            kind: IssueKind::MissingField,
                            message: format!("required field '{}' is missing", field.name),
                        });
                    }
                }
                Some(value) => match (field.kind, value) {
                    (FieldKind::Number, FieldValue::Number(n)) => {
                        values.push((field.name.clone(), FeatureValue::Number(*n)));
                    }
                    (FieldKind::Category, FieldValue::Category(level)) => {
                        values.push((field.name.clone(), FeatureValue::Category(level.clone())));
                    }
                    (FieldKind::Text, FieldValue::Text(text)) => {
                        self.extract_text(&field.name, text, &mut values);
                    }
                    (expected, actual) => {
                        issues.push(ExtractionIssue {
                            field: field.name.clone(),
                            kind: IssueKind::WrongKind,
                            message: format!(
                                "field '{}' declared as {expected} but carries a {} value",
                                field.name,
                                actual.kind().map_or_else(|| "missing".to_string(), |k| k.to_string())
                            ),
                        });
                    }
                },
            }
        }

        if !issues.is_empty() {
            log::debug!(
                target: LOG_TARGET,
                "record {} extracted with {} issue(s)",
                record.fingerprint(),
                issues.len()
            );
        }

        (
            FeatureVector {
                fingerprint: *record.fingerprint(),
                values,
            },
            issues,
        )
    }

    /// Expands one text field into statistics and token features.
    fn extract_text(&self, field: &str, text: &str, values: &mut Vec<(String, FeatureValue)>) {
        let tokens = self.tokenize(text);
        let stats = TextStats::compute(text, &tokens);

        values.push((format!("{field}.chars"), FeatureValue::Number(stats.chars as f64)));
        values.push((format!("{field}.words"), FeatureValue::Number(stats.words as f64)));
        values.push((format!("{field}.sentences"), FeatureValue::Number(stats.sentences as f64)));
        values.push((
            format!("{field}.avg_sentence_length"),
            FeatureValue::Number(stats.avg_sentence_length),
        ));
        values.push((
            format!("{field}.avg_syllables_per_word"),
            FeatureValue::Number(stats.avg_syllables_per_word),
        ));
        values.push((format!("{field}.tokens"), FeatureValue::Tokens(tokens)));
    }

    /// Splits text into word tokens under the configured normalization.
    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut normalized = if self.config.normalize_hyphens {
            text.replace('-', " ")
        } else {
            text.to_string()
        };
        if !self.config.case_sensitive {
            normalized = normalized.to_lowercase();
        }

        normalized
            .split_whitespace()
            .map(|token| {
                token
                    .chars()
                    .filter(|c| c.is_alphanumeric() || *c == '\'')
                    .collect::<String>()
            })
            .filter(|token| !token.is_empty())
            .collect()
    }
}
