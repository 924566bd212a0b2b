//! In-memory store implementation.
//!
//! Used by tests and by embedders that do not need durability. Tables
//! mirror the relational layout so behavior matches the Postgres store:
//! timeline headers and scenarios live in separate maps, and deleting a
//! timeline cascades.

use crate::error::StoreError;
use crate::store::TimelineStore;
use async_trait::async_trait;
use scene_director_core::{ScenarioId, TimelineId};
use scene_director_timeline::{LogEntry, Scenario, Timeline};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Tables {
    timelines: HashMap<TimelineId, Timeline>,
    scenarios: HashMap<ScenarioId, (TimelineId, Scenario)>,
    log: Vec<LogEntry>,
}

/// An in-memory [`TimelineStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all log entries, in append order.
    #[must_use]
    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.tables.lock().expect("store lock poisoned").log.clone()
    }
}

#[async_trait]
impl TimelineStore for MemoryStore {
    async fn upsert_timeline(&self, timeline: &Timeline) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("store lock poisoned");
        let mut header = timeline.clone();
        header.scenarios = Vec::new();
        tables.timelines.insert(timeline.id, header);
        Ok(())
    }

    async fn fetch_timeline(&self, id: TimelineId) -> Result<Option<Timeline>, StoreError> {
        let tables = self.tables.lock().expect("store lock poisoned");
        let Some(header) = tables.timelines.get(&id) else {
            return Ok(None);
        };

        let mut timeline = header.clone();
        let mut scenarios: Vec<Scenario> = tables
            .scenarios
            .values()
            .filter(|(owner, _)| *owner == id)
            .map(|(_, scenario)| scenario.clone())
            .collect();
        // Same sort key as the Postgres adapter; creation time breaks
        // trigger time ties, so same-time scenarios keep insertion order.
        scenarios.sort_by_key(|s| (s.trigger_time, s.created_at, s.id));
        timeline.scenarios = scenarios;
        Ok(Some(timeline))
    }

    async fn delete_timeline(&self, id: TimelineId) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("store lock poisoned");
        tables.timelines.remove(&id);
        tables.scenarios.retain(|_, (owner, _)| *owner != id);
        tables.log.retain(|entry| entry.timeline_id != id);
        Ok(())
    }

    async fn upsert_scenario(
        &self,
        timeline_id: TimelineId,
        scenario: &Scenario,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("store lock poisoned");
        tables
            .scenarios
            .insert(scenario.id, (timeline_id, scenario.clone()));
        Ok(())
    }

    async fn delete_scenario(&self, id: ScenarioId) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("store lock poisoned");
        tables.scenarios.remove(&id);
        Ok(())
    }

    async fn append_log(&self, entry: &LogEntry) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("store lock poisoned");
        tables.log.push(entry.clone());
        Ok(())
    }

    async fn list_timeline_ids(&self) -> Result<Vec<TimelineId>, StoreError> {
        let tables = self.tables.lock().expect("store lock poisoned");
        let mut ids: Vec<TimelineId> = tables.timelines.keys().copied().collect();
        // ULIDs are time-ordered, so sorting ids descending orders by
        // creation time descending.
        ids.sort_unstable_by(|a, b| b.cmp(a));
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene_director_timeline::{
        LogAction, ScenarioKind, ScenarioSpec, ScenarioStatus, TriggerKind,
    };
    use serde_json::Map;

    fn sample_timeline() -> Timeline {
        let mut timeline = Timeline::new("night at the inn", "opening act", Map::new());
        timeline.insert_scenario(Scenario::new(
            ScenarioSpec::new("storm rolls in", ScenarioKind::Environment, TriggerKind::Time)
                .with_trigger_time(10)
                .with_content(serde_json::json!({"weather": "storm"})),
        ));
        timeline.insert_scenario(Scenario::new(
            ScenarioSpec::new("innkeeper greets", ScenarioKind::Dialogue, TriggerKind::Time)
                .with_trigger_time(0)
                .with_environment("inn_common_room"),
        ));
        timeline
    }

    #[tokio::test]
    async fn round_trips_timeline_with_scenarios() {
        let store = MemoryStore::new();
        let timeline = sample_timeline();

        store.upsert_timeline(&timeline).await.unwrap();
        for scenario in &timeline.scenarios {
            store.upsert_scenario(timeline.id, scenario).await.unwrap();
        }

        let loaded = store
            .fetch_timeline(timeline.id)
            .await
            .unwrap()
            .expect("timeline should exist");

        assert_eq!(loaded.scenarios.len(), 2);
        // Reload yields the same order and field values.
        assert_eq!(loaded.scenarios, timeline.scenarios);
        assert_eq!(loaded.name, timeline.name);
    }

    #[tokio::test]
    async fn fetch_unknown_returns_none() {
        let store = MemoryStore::new();
        assert!(store.fetch_timeline(TimelineId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn header_upsert_does_not_touch_scenarios() {
        let store = MemoryStore::new();
        let mut timeline = sample_timeline();

        store.upsert_timeline(&timeline).await.unwrap();
        for scenario in &timeline.scenarios {
            store.upsert_scenario(timeline.id, scenario).await.unwrap();
        }

        // Mutate the in-memory copy's scenarios, then persist the header only.
        timeline.scenarios[0].status = ScenarioStatus::Completed;
        timeline.elapsed_secs = 99;
        store.upsert_timeline(&timeline).await.unwrap();

        let loaded = store.fetch_timeline(timeline.id).await.unwrap().unwrap();
        assert_eq!(loaded.elapsed_secs, 99);
        assert_eq!(loaded.scenarios[0].status, ScenarioStatus::Pending);
    }

    #[tokio::test]
    async fn delete_cascades() {
        let store = MemoryStore::new();
        let timeline = sample_timeline();

        store.upsert_timeline(&timeline).await.unwrap();
        for scenario in &timeline.scenarios {
            store.upsert_scenario(timeline.id, scenario).await.unwrap();
        }
        store
            .append_log(&LogEntry::timeline(timeline.id, LogAction::Start, "run"))
            .await
            .unwrap();

        store.delete_timeline(timeline.id).await.unwrap();
        assert!(store.fetch_timeline(timeline.id).await.unwrap().is_none());
        assert!(store.log_entries().is_empty());

        // Idempotent.
        store.delete_timeline(timeline.id).await.unwrap();
    }

    #[tokio::test]
    async fn lists_ids_creation_descending() {
        let store = MemoryStore::new();
        let first = Timeline::new("first", "", Map::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = Timeline::new("second", "", Map::new());

        store.upsert_timeline(&first).await.unwrap();
        store.upsert_timeline(&second).await.unwrap();

        let ids = store.list_timeline_ids().await.unwrap();
        assert_eq!(ids, vec![second.id, first.id]);
    }
}
