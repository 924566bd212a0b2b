//! Timeline aggregate: an ordered scenario collection plus run-time state.

use crate::scenario::{Scenario, ScenarioStatus};
use chrono::{DateTime, Utc};
use scene_director_core::{ScenarioId, TimelineId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// An ordered, named sequence of scenarios with its own run/pause/elapsed
/// state.
///
/// Scenarios are exclusively owned by their timeline and kept sorted by
/// `trigger_time` ascending; insertion re-sorts. Sequence-trigger adjacency
/// is by list index, which this sort order defines.
///
/// Invariants: `is_paused` implies `is_active`, and `current_index` stays
/// within `[-1, scenarios.len() - 1]`. The single-active-timeline invariant
/// is process-wide and enforced by the engine, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Unique identifier.
    pub id: TimelineId,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Owned scenarios, sorted by `trigger_time` ascending.
    pub scenarios: Vec<Scenario>,
    /// Whether this timeline is the running session.
    pub is_active: bool,
    /// Whether the running session is paused.
    pub is_paused: bool,
    /// When the current run started.
    pub start_time: Option<DateTime<Utc>>,
    /// Index of the most recently activated scenario; -1 means not begun.
    pub current_index: i64,
    /// Seconds accumulated since start; frozen while paused.
    pub elapsed_secs: u64,
    /// Free-form metadata.
    pub metadata: Map<String, JsonValue>,
    /// When the timeline was created.
    pub created_at: DateTime<Utc>,
    /// When the timeline was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Timeline {
    /// Creates a new empty timeline.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        metadata: Map<String, JsonValue>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TimelineId::new(),
            name: name.into(),
            description: description.into(),
            scenarios: Vec::new(),
            is_active: false,
            is_paused: false,
            start_time: None,
            current_index: -1,
            elapsed_secs: 0,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Stamps `updated_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Inserts a scenario, maintaining the `trigger_time` sort order.
    ///
    /// The sort is stable, so scenarios with equal trigger times keep their
    /// insertion order.
    pub fn insert_scenario(&mut self, scenario: Scenario) {
        self.scenarios.push(scenario);
        self.scenarios.sort_by_key(|s| s.trigger_time);
    }

    /// Returns the list index of a scenario by id.
    #[must_use]
    pub fn scenario_index(&self, id: ScenarioId) -> Option<usize> {
        self.scenarios.iter().position(|s| s.id == id)
    }

    /// Returns the scenario at the cursor, if the cursor points at one.
    #[must_use]
    pub fn current_scenario(&self) -> Option<&Scenario> {
        usize::try_from(self.current_index)
            .ok()
            .and_then(|idx| self.scenarios.get(idx))
    }

    /// Returns the index of the first pending scenario in list order.
    #[must_use]
    pub fn first_pending(&self) -> Option<usize> {
        self.scenarios
            .iter()
            .position(|s| s.status == ScenarioStatus::Pending)
    }

    /// Returns true when every scenario has reached a terminal status.
    ///
    /// An empty timeline is never finished; it is not startable either.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !self.scenarios.is_empty() && self.scenarios.iter().all(|s| s.status.is_terminal())
    }

    /// Resets run-time state for a fresh start: cursor and clock cleared,
    /// every scenario back to pending, active and unpaused.
    pub fn reset_for_start(&mut self, now: DateTime<Utc>) {
        self.is_active = true;
        self.is_paused = false;
        self.start_time = Some(now);
        self.current_index = -1;
        self.elapsed_secs = 0;
        for scenario in &mut self.scenarios {
            scenario.reset(now);
        }
        self.touch(now);
    }

    /// Clears the active/paused flags when the session ends.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.is_paused = false;
        self.touch(now);
    }

    /// Counts scenarios with the given status.
    #[must_use]
    pub fn count_status(&self, status: ScenarioStatus) -> usize {
        self.scenarios.iter().filter(|s| s.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{ScenarioKind, ScenarioSpec, TriggerKind};

    fn time_scenario(name: &str, trigger_time: u64) -> Scenario {
        Scenario::new(
            ScenarioSpec::new(name, ScenarioKind::Event, TriggerKind::Time)
                .with_trigger_time(trigger_time),
        )
    }

    #[test]
    fn insertion_keeps_trigger_time_order() {
        let mut timeline = Timeline::new("test", "", Map::new());
        timeline.insert_scenario(time_scenario("c", 30));
        timeline.insert_scenario(time_scenario("a", 0));
        timeline.insert_scenario(time_scenario("b", 10));

        let names: Vec<&str> = timeline.scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn insertion_is_stable_for_equal_trigger_times() {
        let mut timeline = Timeline::new("test", "", Map::new());
        timeline.insert_scenario(time_scenario("first", 5));
        timeline.insert_scenario(time_scenario("second", 5));

        assert_eq!(timeline.scenarios[0].name, "first");
        assert_eq!(timeline.scenarios[1].name, "second");
    }

    #[test]
    fn earlier_insertion_shifts_sequence_adjacency() {
        // Inserting an earlier trigger time shifts list indices; sequence
        // adjacency follows the list, by design of the source material.
        let mut timeline = Timeline::new("test", "", Map::new());
        timeline.insert_scenario(time_scenario("b", 10));
        timeline.insert_scenario(time_scenario("a", 0));

        assert_eq!(timeline.scenario_index(timeline.scenarios[0].id), Some(0));
        assert_eq!(timeline.scenarios[0].name, "a");
    }

    #[test]
    fn reset_for_start_clears_run_state() {
        let mut timeline = Timeline::new("test", "", Map::new());
        timeline.insert_scenario(time_scenario("a", 0));
        timeline.scenarios[0].activate(Utc::now());
        timeline.current_index = 0;
        timeline.elapsed_secs = 42;

        timeline.reset_for_start(Utc::now());
        assert!(timeline.is_active);
        assert!(!timeline.is_paused);
        assert_eq!(timeline.current_index, -1);
        assert_eq!(timeline.elapsed_secs, 0);
        assert_eq!(timeline.scenarios[0].status, ScenarioStatus::Pending);
    }

    #[test]
    fn finished_requires_all_terminal() {
        let mut timeline = Timeline::new("test", "", Map::new());
        assert!(!timeline.is_finished());

        timeline.insert_scenario(time_scenario("a", 0));
        timeline.insert_scenario(time_scenario("b", 5));
        assert!(!timeline.is_finished());

        let now = Utc::now();
        timeline.scenarios[0].complete(now);
        assert!(!timeline.is_finished());

        timeline.scenarios[1].skip(now);
        assert!(timeline.is_finished());
    }

    #[test]
    fn current_scenario_respects_cursor() {
        let mut timeline = Timeline::new("test", "", Map::new());
        assert!(timeline.current_scenario().is_none());

        timeline.insert_scenario(time_scenario("a", 0));
        assert!(timeline.current_scenario().is_none());

        timeline.current_index = 0;
        assert_eq!(timeline.current_scenario().map(|s| s.name.as_str()), Some("a"));
    }
}
