//! Append-only execution log records.
//!
//! Every mutating scheduler action leaves a log entry so a session can be
//! audited after the fact. Entries are write-once; nothing updates or
//! deletes them.

use crate::scenario::UnknownVariant;
use chrono::{DateTime, Utc};
use scene_director_core::{LogEntryId, ScenarioId, TimelineId};
use serde::{Deserialize, Serialize};

/// The action a log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    /// A scenario's trigger fired and it became active.
    Trigger,
    /// A scenario completed.
    Complete,
    /// A scenario was skipped during fast-forward.
    Skip,
    /// A timeline session started.
    Start,
    /// A session was paused.
    Pause,
    /// A session was resumed.
    Resume,
    /// A session stopped.
    Stop,
    /// A scenario was added to a timeline.
    ScenarioAdded,
    /// A scenario's fields were edited.
    ScenarioUpdated,
    /// A scenario was removed from a timeline.
    ScenarioRemoved,
}

impl LogAction {
    /// Returns the storage string for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Complete => "complete",
            Self::Skip => "skip",
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::ScenarioAdded => "scenario_added",
            Self::ScenarioUpdated => "scenario_updated",
            Self::ScenarioRemoved => "scenario_removed",
        }
    }

    /// Parses a storage string.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownVariant`] if the string names no known action.
    pub fn parse(s: &str) -> Result<Self, UnknownVariant> {
        match s {
            "trigger" => Ok(Self::Trigger),
            "complete" => Ok(Self::Complete),
            "skip" => Ok(Self::Skip),
            "start" => Ok(Self::Start),
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "stop" => Ok(Self::Stop),
            "scenario_added" => Ok(Self::ScenarioAdded),
            "scenario_updated" => Ok(Self::ScenarioUpdated),
            "scenario_removed" => Ok(Self::ScenarioRemoved),
            _ => Err(UnknownVariant {
                kind: "log action",
                value: s.to_string(),
            }),
        }
    }
}

/// A single append-only execution log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique identifier.
    pub id: LogEntryId,
    /// The timeline the action applies to.
    pub timeline_id: TimelineId,
    /// The scenario the action applies to, if any.
    pub scenario_id: Option<ScenarioId>,
    /// What happened.
    pub action: LogAction,
    /// Human-readable detail.
    pub details: String,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Creates a timeline-level entry.
    #[must_use]
    pub fn timeline(timeline_id: TimelineId, action: LogAction, details: impl Into<String>) -> Self {
        Self {
            id: LogEntryId::new(),
            timeline_id,
            scenario_id: None,
            action,
            details: details.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a scenario-level entry.
    #[must_use]
    pub fn scenario(
        timeline_id: TimelineId,
        scenario_id: ScenarioId,
        action: LogAction,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: LogEntryId::new(),
            timeline_id,
            scenario_id: Some(scenario_id),
            action,
            details: details.into(),
            timestamp: Utc::now(),
        }
    }
}
