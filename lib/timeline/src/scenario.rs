//! Scenario types and the scenario lifecycle state machine.
//!
//! A scenario is the leaf schedulable unit: a trigger rule deciding when it
//! may activate, an opaque content payload handed to the consumer verbatim,
//! and a lifecycle status. Legal status transitions are
//! `Pending -> Active -> Completed` and `Pending -> Skipped`; no transition
//! leaves a terminal state.

use chrono::{DateTime, Utc};
use scene_director_core::ScenarioId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Error for an enum string that does not name a known variant.
///
/// Raised when decoding persisted records; an unrecognized value is a
/// storage-level fault, never silently defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    /// The enum being decoded.
    pub kind: &'static str,
    /// The offending string.
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} value: {}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// The descriptive category of a scenario.
///
/// Purely informational for the consumer; scheduling behavior never
/// depends on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Scene-setting or environment change.
    Environment,
    /// Conversational beat driven by the consumer.
    Dialogue,
    /// A discrete story event.
    Event,
    /// An emotional shift.
    Emotion,
    /// A physical action.
    Action,
}

impl ScenarioKind {
    /// Returns the storage string for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Environment => "environment",
            Self::Dialogue => "dialogue",
            Self::Event => "event",
            Self::Emotion => "emotion",
            Self::Action => "action",
        }
    }

    /// Parses a storage string.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownVariant`] if the string names no known kind.
    pub fn parse(s: &str) -> Result<Self, UnknownVariant> {
        match s {
            "environment" => Ok(Self::Environment),
            "dialogue" => Ok(Self::Dialogue),
            "event" => Ok(Self::Event),
            "emotion" => Ok(Self::Emotion),
            "action" => Ok(Self::Action),
            _ => Err(UnknownVariant {
                kind: "scenario kind",
                value: s.to_string(),
            }),
        }
    }
}

/// The rule class deciding when a pending scenario may activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Fires when the timeline's elapsed time reaches `trigger_time`.
    Time,
    /// Fires only through an external call; the condition string is opaque
    /// to the scheduler and evaluated by the consumer.
    Condition,
    /// Fires only through an explicit manual advance.
    Manual,
    /// Fires when first in the list, or when the scenario at the preceding
    /// list index has completed. Adjacency is by list position, not by
    /// trigger time.
    Sequence,
}

impl TriggerKind {
    /// Returns the storage string for this trigger kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Condition => "condition",
            Self::Manual => "manual",
            Self::Sequence => "sequence",
        }
    }

    /// Parses a storage string.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownVariant`] if the string names no known trigger kind.
    pub fn parse(s: &str) -> Result<Self, UnknownVariant> {
        match s {
            "time" => Ok(Self::Time),
            "condition" => Ok(Self::Condition),
            "manual" => Ok(Self::Manual),
            "sequence" => Ok(Self::Sequence),
            _ => Err(UnknownVariant {
                kind: "trigger kind",
                value: s.to_string(),
            }),
        }
    }
}

/// Lifecycle status of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    /// Waiting for its trigger.
    Pending,
    /// Currently the live scenario of its timeline.
    Active,
    /// Finished normally.
    Completed,
    /// Fast-forwarded past without activating.
    Skipped,
}

impl ScenarioStatus {
    /// Returns true if this is a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }

    /// Returns the storage string for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }

    /// Parses a storage string.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownVariant`] if the string names no known status.
    pub fn parse(s: &str) -> Result<Self, UnknownVariant> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(UnknownVariant {
                kind: "scenario status",
                value: s.to_string(),
            }),
        }
    }
}

/// Caller-supplied payload for creating a scenario.
///
/// Everything except identity, status, and timestamps, which are assigned
/// at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Descriptive category.
    pub kind: ScenarioKind,
    /// Trigger rule class.
    pub trigger_kind: TriggerKind,
    /// Trigger time in seconds of timeline elapsed time (Time triggers only).
    pub trigger_time: u64,
    /// Opaque condition string, evaluated by the consumer.
    pub trigger_condition: Option<String>,
    /// Opaque structured payload passed to the consumer verbatim.
    pub content: JsonValue,
    /// Duration in seconds; 0 means "completes immediately once activated".
    pub duration: u64,
    /// If true and the duration elapses, the scenario self-completes.
    pub auto_advance: bool,
    /// Opaque environment reference owned by the consumer domain.
    pub environment_id: Option<String>,
    /// Free-form metadata.
    pub metadata: Map<String, JsonValue>,
}

impl ScenarioSpec {
    /// Creates a spec with the given name and trigger class; everything
    /// else defaults.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ScenarioKind, trigger_kind: TriggerKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            kind,
            trigger_kind,
            trigger_time: 0,
            trigger_condition: None,
            content: JsonValue::Null,
            duration: 0,
            auto_advance: false,
            environment_id: None,
            metadata: Map::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the trigger time in seconds.
    #[must_use]
    pub fn with_trigger_time(mut self, seconds: u64) -> Self {
        self.trigger_time = seconds;
        self
    }

    /// Sets the opaque trigger condition.
    #[must_use]
    pub fn with_trigger_condition(mut self, condition: impl Into<String>) -> Self {
        self.trigger_condition = Some(condition.into());
        self
    }

    /// Sets the content payload.
    #[must_use]
    pub fn with_content(mut self, content: JsonValue) -> Self {
        self.content = content;
        self
    }

    /// Sets the duration and auto-advance flag.
    #[must_use]
    pub fn with_duration(mut self, seconds: u64, auto_advance: bool) -> Self {
        self.duration = seconds;
        self.auto_advance = auto_advance;
        self
    }

    /// Sets the environment reference.
    #[must_use]
    pub fn with_environment(mut self, environment_id: impl Into<String>) -> Self {
        self.environment_id = Some(environment_id.into());
        self
    }

    /// Sets the metadata map.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, JsonValue>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A single schedulable unit within a timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique identifier, immutable after creation.
    pub id: ScenarioId,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Descriptive category (does not affect scheduling).
    pub kind: ScenarioKind,
    /// Trigger rule class.
    pub trigger_kind: TriggerKind,
    /// Trigger time in seconds (meaningful for Time triggers).
    pub trigger_time: u64,
    /// Opaque condition string, evaluated by the consumer.
    pub trigger_condition: Option<String>,
    /// Opaque payload passed to the consumer verbatim.
    pub content: JsonValue,
    /// Duration in seconds; 0 completes immediately once activated.
    pub duration: u64,
    /// Whether the scenario self-completes when the duration elapses.
    pub auto_advance: bool,
    /// Opaque environment reference owned by the consumer domain.
    pub environment_id: Option<String>,
    /// Free-form metadata.
    pub metadata: Map<String, JsonValue>,
    /// Lifecycle status.
    pub status: ScenarioStatus,
    /// When the scenario was created.
    pub created_at: DateTime<Utc>,
    /// When the scenario was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Scenario {
    /// Creates a new pending scenario from a spec.
    #[must_use]
    pub fn new(spec: ScenarioSpec) -> Self {
        let now = Utc::now();
        Self {
            id: ScenarioId::new(),
            name: spec.name,
            description: spec.description,
            kind: spec.kind,
            trigger_kind: spec.trigger_kind,
            trigger_time: spec.trigger_time,
            trigger_condition: spec.trigger_condition,
            content: spec.content,
            duration: spec.duration,
            auto_advance: spec.auto_advance,
            environment_id: spec.environment_id,
            metadata: spec.metadata,
            status: ScenarioStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks the scenario active.
    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.status = ScenarioStatus::Active;
        self.updated_at = now;
    }

    /// Marks the scenario completed.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = ScenarioStatus::Completed;
        self.updated_at = now;
    }

    /// Marks the scenario skipped.
    pub fn skip(&mut self, now: DateTime<Utc>) {
        self.status = ScenarioStatus::Skipped;
        self.updated_at = now;
    }

    /// Resets the scenario to pending (timeline restart).
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.status = ScenarioStatus::Pending;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_terminality() {
        assert!(!ScenarioStatus::Pending.is_terminal());
        assert!(!ScenarioStatus::Active.is_terminal());
        assert!(ScenarioStatus::Completed.is_terminal());
        assert!(ScenarioStatus::Skipped.is_terminal());
    }

    #[test]
    fn enum_strings_round_trip() {
        for kind in [
            ScenarioKind::Environment,
            ScenarioKind::Dialogue,
            ScenarioKind::Event,
            ScenarioKind::Emotion,
            ScenarioKind::Action,
        ] {
            assert_eq!(ScenarioKind::parse(kind.as_str()), Ok(kind));
        }
        for trigger in [
            TriggerKind::Time,
            TriggerKind::Condition,
            TriggerKind::Manual,
            TriggerKind::Sequence,
        ] {
            assert_eq!(TriggerKind::parse(trigger.as_str()), Ok(trigger));
        }
        for status in [
            ScenarioStatus::Pending,
            ScenarioStatus::Active,
            ScenarioStatus::Completed,
            ScenarioStatus::Skipped,
        ] {
            assert_eq!(ScenarioStatus::parse(status.as_str()), Ok(status));
        }
    }

    #[test]
    fn unknown_enum_string_is_an_error() {
        let err = ScenarioStatus::parse("paused").expect_err("should fail");
        assert_eq!(err.value, "paused");
        assert!(TriggerKind::parse("webhook").is_err());
        assert!(ScenarioKind::parse("").is_err());
    }

    #[test]
    fn new_scenario_is_pending() {
        let spec = ScenarioSpec::new("opening", ScenarioKind::Environment, TriggerKind::Time)
            .with_trigger_time(5)
            .with_duration(10, true)
            .with_content(serde_json::json!({"scene": "tavern"}));

        let scenario = Scenario::new(spec);
        assert_eq!(scenario.status, ScenarioStatus::Pending);
        assert_eq!(scenario.trigger_time, 5);
        assert_eq!(scenario.duration, 10);
        assert!(scenario.auto_advance);
        assert_eq!(scenario.content["scene"], "tavern");
    }

    #[test]
    fn lifecycle_transitions_stamp_updated_at() {
        let mut scenario = Scenario::new(ScenarioSpec::new(
            "beat",
            ScenarioKind::Event,
            TriggerKind::Sequence,
        ));
        let created = scenario.updated_at;

        let later = created + chrono::Duration::seconds(3);
        scenario.activate(later);
        assert_eq!(scenario.status, ScenarioStatus::Active);
        assert_eq!(scenario.updated_at, later);

        scenario.complete(later);
        assert_eq!(scenario.status, ScenarioStatus::Completed);
    }
}
