//! Example record type definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Field name of the example input.
pub const INPUT_FIELD: &str = "input";

/// Field name of the example annotation.
pub const OUTPUT_FIELD: &str = "output";

/// One training example as stored in the index.
///
/// Fields are addressed by name: `input`, `output`, or any metadata key.
/// Immutable once indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleRecord {
    /// Example text
    pub input: String,

    /// Annotation; absent for unsupervised tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Extra string fields usable by search filters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ExampleRecord {
    /// Unsupervised record.
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Supervised record.
    pub fn annotated(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            ..Self::new(input)
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Look up a field by name.
    pub fn field(&self, key: &str) -> Option<&str> {
        match key {
            INPUT_FIELD => Some(self.input.as_str()),
            OUTPUT_FIELD => self.output.as_deref(),
            other => self.metadata.get(other).map(String::as_str),
        }
    }

    /// All fields as an ordered map.
    fn fields(&self) -> BTreeMap<&str, &str> {
        let mut fields: BTreeMap<&str, &str> = self
            .metadata
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        fields.insert(INPUT_FIELD, &self.input);
        if let Some(output) = &self.output {
            fields.insert(OUTPUT_FIELD, output);
        }
        fields
    }

    /// Text that gets embedded for this record.
    ///
    /// Field values ordered by field name and joined by a space, restricted
    /// to `input_keys` when given.
    pub fn embedding_text(&self, input_keys: Option<&[String]>) -> String {
        let fields = self.fields();
        let values: Vec<&str> = match input_keys {
            Some(keys) => fields
                .iter()
                .filter(|(name, _)| keys.iter().any(|k| k == *name))
                .map(|(_, value)| *value)
                .collect(),
            None => fields.values().copied().collect(),
        };
        values.join(" ")
    }
}

/// Whether examples carry annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Supervision {
    Supervised,
    Unsupervised,
}

impl Supervision {
    pub fn is_supervised(&self) -> bool {
        matches!(self, Supervision::Supervised)
    }
}

impl fmt::Display for Supervision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Supervision::Supervised => f.write_str("supervised"),
            Supervision::Unsupervised => f.write_str("unsupervised"),
        }
    }
}

/// Exact-match conditions on record fields. All conditions must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    conditions: BTreeMap<String, String>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter with a single condition.
    pub fn eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new().and(key, value)
    }

    pub fn and(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, record: &ExampleRecord) -> bool {
        self.conditions
            .iter()
            .all(|(key, value)| record.field(key) == Some(value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// A search hit with its similarity score (higher is closer).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredExample {
    pub record: ExampleRecord,
    pub score: f32,
}
