//! Records and per-record results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ValidationError;

/// One row to create: an ordered mapping from field name to JSON value.
///
/// A record has no identity of its own; it is addressed by its position in
/// the caller's input list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

impl TryFrom<Value> for Record {
    type Error = Value;

    /// Fails with the original value when it is not a JSON object.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

/// Convert untyped input into records, rejecting anything that is not an
/// array of objects.
pub fn records_from_json(data: Value) -> Result<Vec<Record>, ValidationError> {
    let Value::Array(items) = data else {
        return Err(ValidationError::NotAList);
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            Record::try_from(item).map_err(|_| ValidationError::NotAnObject { index })
        })
        .collect()
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Success,
    Error,
    Unknown,
}

impl RecordStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a batch response said about one sub-request, before it is paired
/// with its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub status: RecordStatus,
    pub id: Option<String>,
    pub error: Option<String>,
}

impl RecordOutcome {
    #[must_use]
    pub fn success(id: Option<String>) -> Self {
        Self {
            status: RecordStatus::Success,
            id,
            error: None,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: RecordStatus::Error,
            id: None,
            error: Some(message.into()),
        }
    }

    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            status: RecordStatus::Unknown,
            id: None,
            error: None,
        }
    }
}

/// Final result for one input record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResult {
    /// Position of the record in the caller's input.
    pub index: usize,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub record: Record,
}

impl RecordResult {
    #[must_use]
    pub fn new(index: usize, outcome: RecordOutcome, record: Record) -> Self {
        Self {
            index,
            status: outcome.status,
            id: outcome.id,
            error: outcome.error,
            record,
        }
    }

    #[must_use]
    pub fn failed(index: usize, message: impl Into<String>, record: Record) -> Self {
        Self::new(index, RecordOutcome::error(message), record)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == RecordStatus::Success
    }
}
