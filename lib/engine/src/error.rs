//! Error types for the director engine.

use scene_director_store::StoreError;
use std::fmt;

/// Errors from repository and control surface operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectorError {
    /// Unknown timeline or scenario id.
    NotFound { entity: &'static str, id: String },
    /// The operation is not valid in the current session state.
    InvalidState { reason: String },
    /// The persistence adapter failed.
    Storage(StoreError),
}

impl DirectorError {
    /// Builds a not-found error for the given entity.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Builds an invalid-state error.
    #[must_use]
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DirectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidState { reason } => write!(f, "invalid state: {reason}"),
            Self::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for DirectorError {}

impl From<StoreError> for DirectorError {
    fn from(e: StoreError) -> Self {
        Self::Storage(e)
    }
}

/// Error raised by a scenario consumer.
///
/// Consumer errors are caught and logged by the engine, never propagated
/// into the tick loop; a misbehaving consumer must not crash the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerError {
    /// What went wrong, from the consumer's point of view.
    pub message: String,
}

impl ConsumerError {
    /// Creates a consumer error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ConsumerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scenario consumer failed: {}", self.message)
    }
}

impl std::error::Error for ConsumerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        let err = DirectorError::invalid_state("no active timeline");
        assert!(err.to_string().contains("no active timeline"));

        let err = DirectorError::not_found("timeline", "tl_123");
        assert!(err.to_string().contains("timeline not found"));

        let err = DirectorError::from(StoreError::storage("db down"));
        assert!(err.to_string().contains("db down"));
    }
}
