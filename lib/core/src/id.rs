//! Strongly-typed ID types for domain entities.
//!
//! All IDs use ULID (Universally Unique Lexicographically Sortable Identifier) format,
//! providing both uniqueness and temporal ordering. Because ULIDs sort by creation
//! time, ordering records by ID is equivalent to ordering by creation time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to generate a strongly-typed ID wrapper around ULID.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Creates a new ID with a randomly generated ULID.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Creates an ID from a ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }

            /// Returns the prefix used for display formatting.
            #[must_use]
            pub const fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Try with prefix first
                let prefix_with_underscore = concat!($prefix, "_");
                let ulid_str = if let Some(stripped) = s.strip_prefix(prefix_with_underscore) {
                    stripped
                } else {
                    // Try parsing as raw ULID
                    s
                };

                Ulid::from_str(ulid_str)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        reason: e.to_string(),
                    })
            }
        }

        impl From<Ulid> for $name {
            fn from(ulid: Ulid) -> Self {
                Self(ulid)
            }
        }

        impl From<$name> for Ulid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Unique identifier for a timeline.
    TimelineId,
    "tl"
);

define_id!(
    /// Unique identifier for a scenario within a timeline.
    ScenarioId,
    "scn"
);

define_id!(
    /// Unique identifier for an execution log entry.
    LogEntryId,
    "log"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_prefix() {
        let id = TimelineId::new();
        assert!(id.to_string().starts_with("tl_"));

        let id = ScenarioId::new();
        assert!(id.to_string().starts_with("scn_"));
    }

    #[test]
    fn round_trips_through_display() {
        let id = ScenarioId::new();
        let parsed = ScenarioId::from_str(&id.to_string()).expect("should parse");
        assert_eq!(id, parsed);
    }

    #[test]
    fn parses_raw_ulid() {
        let ulid = Ulid::new();
        let parsed = TimelineId::from_str(&ulid.to_string()).expect("should parse");
        assert_eq!(parsed.as_ulid(), ulid);
    }

    #[test]
    fn rejects_garbage() {
        let err = TimelineId::from_str("not-a-ulid").expect_err("should fail");
        assert_eq!(err.id_type, "TimelineId");
    }

    #[test]
    fn ids_order_by_creation() {
        let a = LogEntryId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = LogEntryId::new();
        assert!(a < b);
    }
}
