//! The durable storage contract for timelines and their execution log.

use crate::error::StoreError;
use async_trait::async_trait;
use scene_director_core::{ScenarioId, TimelineId};
use scene_director_timeline::{LogEntry, Scenario, Timeline};

/// Durable CRUD for timelines, their owned scenarios, and an append-only
/// execution log.
///
/// Any storage technology satisfying this contract is acceptable: embedded
/// SQL, a key-value store, or an in-memory map for tests. Implementations
/// must keep the scenario sort key (trigger time ascending) identical to the
/// in-memory order so a reload yields the same list.
#[async_trait]
pub trait TimelineStore: Send + Sync {
    /// Inserts or updates a timeline's header fields.
    ///
    /// Scenarios are persisted individually via [`upsert_scenario`]; this
    /// call never touches them.
    ///
    /// [`upsert_scenario`]: TimelineStore::upsert_scenario
    async fn upsert_timeline(&self, timeline: &Timeline) -> Result<(), StoreError>;

    /// Fetches a timeline with its scenarios eagerly loaded, sorted by
    /// trigger time ascending. Returns `None` for an unknown id.
    async fn fetch_timeline(&self, id: TimelineId) -> Result<Option<Timeline>, StoreError>;

    /// Deletes a timeline along with its scenarios and log entries.
    /// Deleting an unknown id is a no-op.
    async fn delete_timeline(&self, id: TimelineId) -> Result<(), StoreError>;

    /// Inserts or updates a single scenario under its owning timeline.
    async fn upsert_scenario(
        &self,
        timeline_id: TimelineId,
        scenario: &Scenario,
    ) -> Result<(), StoreError>;

    /// Deletes a single scenario. Deleting an unknown id is a no-op.
    async fn delete_scenario(&self, id: ScenarioId) -> Result<(), StoreError>;

    /// Appends an execution log entry.
    async fn append_log(&self, entry: &LogEntry) -> Result<(), StoreError>;

    /// Lists all timeline ids, ordered by creation time descending.
    async fn list_timeline_ids(&self) -> Result<Vec<TimelineId>, StoreError>;
}
