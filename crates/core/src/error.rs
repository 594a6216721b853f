//! Domain error model.

use thiserror::Error;

use crate::mutation::Operation;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic failures of the data model (malformed
/// payloads, bad identifiers). Storage and network concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// An update or delete payload did not name its target record.
    #[error("{0} payload is missing a usable record id")]
    MissingRecordId(Operation),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn missing_record_id(operation: Operation) -> Self {
        Self::MissingRecordId(operation)
    }
}
