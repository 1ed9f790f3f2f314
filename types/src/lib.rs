//! Core domain types for dataverse-batch.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the library.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod credentials;
mod record;

pub use credentials::{ClientCredentials, ClientSecret};
pub use record::{Record, RecordOutcome, RecordResult, RecordStatus, records_from_json};

use std::num::NonZeroUsize;

/// Canonical Microsoft identity platform host.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
/// Web API version segment used in every data URL.
pub const DEFAULT_API_VERSION: &str = "v9.2";

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Validation
// ============================================================================

/// Input rejected before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("the 'data' parameter must be a list")]
    NotAList,
    #[error("all elements in the 'data' list must be objects (element {index} is not)")]
    NotAnObject { index: usize },
    #[error("the table name must be a non-empty string")]
    EmptyTableName,
    #[error("batch size must be greater than zero")]
    ZeroBatchSize,
    #[error("worker count must be greater than zero")]
    ZeroWorkers,
}

// ============================================================================
// TableName
// ============================================================================

/// Entity set name a batch is posted to (e.g. `accounts`).
///
/// Guaranteed non-empty after trimming; surrounding whitespace is removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyTableName);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TableName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for TableName {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.0
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

// ============================================================================
// Counts
// ============================================================================

/// Number of records encoded into one batch envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchSize(NonZeroUsize);

impl BatchSize {
    /// Default chunk size used when the caller gives none.
    pub const DEFAULT: Self = Self(NonZeroUsize::new(100).unwrap());

    pub fn new(value: usize) -> Result<Self, ValidationError> {
        NonZeroUsize::new(value)
            .map(Self)
            .ok_or(ValidationError::ZeroBatchSize)
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for BatchSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Size of the concurrent worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerCount(NonZeroUsize);

impl WorkerCount {
    pub const DEFAULT: Self = Self(NonZeroUsize::new(10).unwrap());

    pub fn new(value: usize) -> Result<Self, ValidationError> {
        NonZeroUsize::new(value)
            .map(Self)
            .ok_or(ValidationError::ZeroWorkers)
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for WorkerCount {
    fn default() -> Self {
        Self::DEFAULT
    }
}
