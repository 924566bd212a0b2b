//! Error types for the persistence adapter.

use std::fmt;

/// Errors from storage operations.
///
/// Storage failures are reported to the caller and never corrupt the
/// in-memory timeline the engine already holds; writes are fire-and-confirm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The underlying storage operation failed.
    StorageFailed { reason: String },
    /// A persisted record could not be decoded (unknown enum string,
    /// malformed id, or undecodable payload).
    InvalidRecord { field: &'static str, value: String },
}

impl StoreError {
    /// Wraps an underlying driver error as a storage failure.
    #[must_use]
    pub fn storage(err: impl fmt::Display) -> Self {
        Self::StorageFailed {
            reason: err.to_string(),
        }
    }

    /// Flags a record field that failed decode validation.
    #[must_use]
    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidRecord {
            field,
            value: value.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageFailed { reason } => write!(f, "storage operation failed: {reason}"),
            Self::InvalidRecord { field, value } => {
                write!(f, "invalid stored record: {field} = {value:?}")
            }
        }
    }
}

impl std::error::Error for StoreError {}
