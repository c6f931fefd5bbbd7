use serde::{Deserialize, Serialize};
use strum::Display;

/// The expected type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Number,
    Text,
    Category,
}

/// One declared field in a batch schema.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaField {
    pub name: String,
    pub kind: FieldKind,

    /// When set, records lacking this field (or carrying an explicit missing
    /// marker) produce an extraction issue on their report.
    #[serde(default)]
    pub required: bool,
}

/// Declares the fields a batch of records is expected to carry.
///
/// The schema travels with the batch across the ingestion boundary and lets
/// the feature extractor validate presence and type before any scorer runs.
/// Fields are extracted in declaration order, which keeps feature vectors
/// deterministic for a given schema and record content.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Schema {
    fields: Vec<SchemaField>,
}

impl Schema {
    #[must_use]
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self { fields }
    }

    /// Returns the declared fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// Looks up a declared field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }
}
