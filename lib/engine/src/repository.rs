//! Timeline repository: a thin façade over the persistence adapter.
//!
//! Keeps the durable record and the returned in-memory object consistent:
//! creation assigns ids and timestamps, mutation stamps `updated_at`, and
//! scenario insertion re-sorts by trigger time. The repository knows nothing
//! about "active" semantics; stopping a running timeline before deleting it
//! is the engine's job.

use crate::error::DirectorError;
use chrono::{DateTime, Utc};
use scene_director_core::{ScenarioId, TimelineId};
use scene_director_store::TimelineStore;
use scene_director_timeline::{LogAction, LogEntry, Scenario, ScenarioSpec, Timeline};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

/// A listing row for a stored timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSummary {
    /// Timeline id.
    pub id: TimelineId,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Number of scenarios in the timeline.
    pub scenario_count: usize,
    /// Whether the timeline was active when last persisted.
    pub is_active: bool,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// When last updated.
    pub updated_at: DateTime<Utc>,
}

/// Synchronous-feeling CRUD façade over a [`TimelineStore`].
#[derive(Clone)]
pub struct TimelineRepository {
    store: Arc<dyn TimelineStore>,
}

impl TimelineRepository {
    /// Creates a repository over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn TimelineStore>) -> Self {
        Self { store }
    }

    /// Returns a handle to the underlying store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn TimelineStore> {
        Arc::clone(&self.store)
    }

    /// Creates and persists a new empty timeline, returning the live object.
    pub async fn create(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        metadata: Map<String, JsonValue>,
    ) -> Result<Timeline, DirectorError> {
        let timeline = Timeline::new(name, description, metadata);
        self.store.upsert_timeline(&timeline).await?;
        Ok(timeline)
    }

    /// Fetches a timeline with its scenarios.
    pub async fn get(&self, id: TimelineId) -> Result<Timeline, DirectorError> {
        self.store
            .fetch_timeline(id)
            .await?
            .ok_or_else(|| DirectorError::not_found("timeline", id))
    }

    /// Lists all stored timelines, newest first.
    pub async fn list(&self) -> Result<Vec<TimelineSummary>, DirectorError> {
        let ids = self.store.list_timeline_ids().await?;
        let mut summaries = Vec::with_capacity(ids.len());
        for id in ids {
            // A timeline deleted between the listing and the fetch is not
            // an error; it is simply no longer listed.
            if let Some(timeline) = self.store.fetch_timeline(id).await? {
                summaries.push(TimelineSummary {
                    id: timeline.id,
                    name: timeline.name,
                    description: timeline.description,
                    scenario_count: timeline.scenarios.len(),
                    is_active: timeline.is_active,
                    created_at: timeline.created_at,
                    updated_at: timeline.updated_at,
                });
            }
        }
        Ok(summaries)
    }

    /// Stamps `updated_at` and persists the timeline's header fields.
    ///
    /// Scenarios are persisted individually, never through this call.
    pub async fn update(&self, timeline: &mut Timeline) -> Result<(), DirectorError> {
        timeline.touch(Utc::now());
        self.store.upsert_timeline(timeline).await?;
        Ok(())
    }

    /// Deletes a timeline and everything it owns. Idempotent.
    pub async fn delete(&self, id: TimelineId) -> Result<(), DirectorError> {
        self.store.delete_timeline(id).await?;
        Ok(())
    }

    /// Adds a scenario to a timeline, keeping trigger-time order, and
    /// returns the created scenario.
    pub async fn add_scenario(
        &self,
        timeline_id: TimelineId,
        spec: ScenarioSpec,
    ) -> Result<Scenario, DirectorError> {
        let mut timeline = self.get(timeline_id).await?;
        let scenario = Scenario::new(spec);

        self.store.upsert_scenario(timeline_id, &scenario).await?;
        timeline.insert_scenario(scenario.clone());
        timeline.touch(Utc::now());
        self.store.upsert_timeline(&timeline).await?;
        self.store
            .append_log(&LogEntry::scenario(
                timeline_id,
                scenario.id,
                LogAction::ScenarioAdded,
                format!("scenario '{}' added", scenario.name),
            ))
            .await?;
        Ok(scenario)
    }

    /// Persists edits to an existing scenario.
    pub async fn update_scenario(
        &self,
        timeline_id: TimelineId,
        mut scenario: Scenario,
    ) -> Result<Scenario, DirectorError> {
        let mut timeline = self.get(timeline_id).await?;
        if timeline.scenario_index(scenario.id).is_none() {
            return Err(DirectorError::not_found("scenario", scenario.id));
        }

        scenario.updated_at = Utc::now();
        self.store.upsert_scenario(timeline_id, &scenario).await?;
        timeline.touch(Utc::now());
        self.store.upsert_timeline(&timeline).await?;
        self.store
            .append_log(&LogEntry::scenario(
                timeline_id,
                scenario.id,
                LogAction::ScenarioUpdated,
                format!("scenario '{}' updated", scenario.name),
            ))
            .await?;
        Ok(scenario)
    }

    /// Removes a scenario from a timeline.
    pub async fn remove_scenario(
        &self,
        timeline_id: TimelineId,
        scenario_id: ScenarioId,
    ) -> Result<(), DirectorError> {
        let mut timeline = self.get(timeline_id).await?;
        let Some(idx) = timeline.scenario_index(scenario_id) else {
            return Err(DirectorError::not_found("scenario", scenario_id));
        };
        let name = timeline.scenarios[idx].name.clone();

        self.store.delete_scenario(scenario_id).await?;
        timeline.scenarios.remove(idx);
        timeline.touch(Utc::now());
        self.store.upsert_timeline(&timeline).await?;
        self.store
            .append_log(&LogEntry::scenario(
                timeline_id,
                scenario_id,
                LogAction::ScenarioRemoved,
                format!("scenario '{name}' removed"),
            ))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene_director_store::MemoryStore;
    use scene_director_timeline::{ScenarioKind, TriggerKind};

    fn repository() -> (TimelineRepository, MemoryStore) {
        let store = MemoryStore::new();
        (TimelineRepository::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let (repo, _) = repository();
        let timeline = repo.create("evening", "first act", Map::new()).await.unwrap();

        let loaded = repo.get(timeline.id).await.unwrap();
        assert_eq!(loaded.id, timeline.id);
        assert_eq!(loaded.name, "evening");
        assert!(!loaded.is_active);
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let (repo, _) = repository();
        let err = repo.get(TimelineId::new()).await.expect_err("should fail");
        assert!(matches!(err, DirectorError::NotFound { entity: "timeline", .. }));
    }

    #[tokio::test]
    async fn add_scenario_keeps_trigger_time_order() {
        let (repo, _) = repository();
        let timeline = repo.create("evening", "", Map::new()).await.unwrap();

        for (name, time) in [("late", 60), ("early", 0), ("middle", 30)] {
            repo.add_scenario(
                timeline.id,
                ScenarioSpec::new(name, ScenarioKind::Event, TriggerKind::Time)
                    .with_trigger_time(time),
            )
            .await
            .unwrap();
        }

        let loaded = repo.get(timeline.id).await.unwrap();
        let names: Vec<&str> = loaded.scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["early", "middle", "late"]);
    }

    #[tokio::test]
    async fn scenario_mutations_leave_log_entries() {
        let (repo, store) = repository();
        let timeline = repo.create("evening", "", Map::new()).await.unwrap();

        let scenario = repo
            .add_scenario(
                timeline.id,
                ScenarioSpec::new("beat", ScenarioKind::Dialogue, TriggerKind::Manual),
            )
            .await
            .unwrap();
        repo.update_scenario(timeline.id, scenario.clone()).await.unwrap();
        repo.remove_scenario(timeline.id, scenario.id).await.unwrap();

        let actions: Vec<LogAction> = store.log_entries().iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                LogAction::ScenarioAdded,
                LogAction::ScenarioUpdated,
                LogAction::ScenarioRemoved,
            ]
        );
    }

    #[tokio::test]
    async fn update_scenario_requires_ownership() {
        let (repo, _) = repository();
        let timeline = repo.create("evening", "", Map::new()).await.unwrap();
        let stray = Scenario::new(ScenarioSpec::new(
            "stray",
            ScenarioKind::Event,
            TriggerKind::Time,
        ));

        let err = repo
            .update_scenario(timeline.id, stray)
            .await
            .expect_err("should fail");
        assert!(matches!(err, DirectorError::NotFound { entity: "scenario", .. }));
    }

    #[tokio::test]
    async fn list_is_newest_first_with_counts() {
        let (repo, _) = repository();
        let first = repo.create("first", "", Map::new()).await.unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = repo.create("second", "", Map::new()).await.unwrap();

        repo.add_scenario(
            first.id,
            ScenarioSpec::new("only", ScenarioKind::Event, TriggerKind::Time),
        )
        .await
        .unwrap();

        let listing = repo.list().await.unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].id, second.id);
        assert_eq!(listing[1].id, first.id);
        assert_eq!(listing[1].scenario_count, 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (repo, _) = repository();
        let timeline = repo.create("gone", "", Map::new()).await.unwrap();

        repo.delete(timeline.id).await.unwrap();
        repo.delete(timeline.id).await.unwrap();
        assert!(repo.get(timeline.id).await.is_err());
    }

    #[tokio::test]
    async fn update_stamps_updated_at() {
        let (repo, _) = repository();
        let mut timeline = repo.create("evening", "", Map::new()).await.unwrap();
        let before = timeline.updated_at;

        std::thread::sleep(std::time::Duration::from_millis(2));
        repo.update(&mut timeline).await.unwrap();
        assert!(timeline.updated_at > before);
    }
}
