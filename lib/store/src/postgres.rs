//! Postgres store implementation backed by sqlx.
//!
//! Enum fields are persisted as plain strings and decoded with explicit
//! validation: an unrecognized value surfaces as
//! [`StoreError::InvalidRecord`], never a silent default. Opaque
//! `content`/`metadata` payloads are stored as JSON-encoded text.

use crate::error::StoreError;
use crate::store::TimelineStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scene_director_core::{ScenarioId, TimelineId};
use scene_director_timeline::{
    LogEntry, Scenario, ScenarioKind, ScenarioStatus, Timeline, TriggerKind,
};
use serde_json::{Map, Value as JsonValue};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;

/// A [`TimelineStore`] backed by Postgres.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StorageFailed`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(StoreError::storage)
    }
}

fn parse_timeline_id(s: &str) -> Result<TimelineId, StoreError> {
    TimelineId::from_str(s).map_err(|_| StoreError::invalid("timeline id", s))
}

fn parse_scenario_id(s: &str) -> Result<ScenarioId, StoreError> {
    ScenarioId::from_str(s).map_err(|_| StoreError::invalid("scenario id", s))
}

fn parse_json(field: &'static str, s: &str) -> Result<JsonValue, StoreError> {
    serde_json::from_str(s).map_err(|_| StoreError::invalid(field, s))
}

fn parse_metadata(field: &'static str, s: &str) -> Result<Map<String, JsonValue>, StoreError> {
    match parse_json(field, s)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(StoreError::invalid(field, other.to_string())),
    }
}

fn get<T>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column).map_err(StoreError::storage)
}

fn timeline_from_row(row: &PgRow) -> Result<Timeline, StoreError> {
    let id: String = get(row, "id")?;
    let metadata: String = get(row, "metadata")?;
    let current_index: i64 = get(row, "current_index")?;
    let elapsed_secs: i64 = get(row, "elapsed_secs")?;

    Ok(Timeline {
        id: parse_timeline_id(&id)?,
        name: get(row, "name")?,
        description: get(row, "description")?,
        scenarios: Vec::new(),
        is_active: get(row, "is_active")?,
        is_paused: get(row, "is_paused")?,
        start_time: get::<Option<DateTime<Utc>>>(row, "start_time")?,
        current_index,
        elapsed_secs: u64::try_from(elapsed_secs)
            .map_err(|_| StoreError::invalid("elapsed_secs", elapsed_secs.to_string()))?,
        metadata: parse_metadata("timeline metadata", &metadata)?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn scenario_from_row(row: &PgRow) -> Result<Scenario, StoreError> {
    let id: String = get(row, "id")?;
    let kind: String = get(row, "kind")?;
    let trigger_kind: String = get(row, "trigger_kind")?;
    let status: String = get(row, "status")?;
    let content: String = get(row, "content")?;
    let metadata: String = get(row, "metadata")?;
    let trigger_time: i64 = get(row, "trigger_time")?;
    let duration: i64 = get(row, "duration")?;

    Ok(Scenario {
        id: parse_scenario_id(&id)?,
        name: get(row, "name")?,
        description: get(row, "description")?,
        kind: ScenarioKind::parse(&kind).map_err(|e| StoreError::invalid("kind", e.value))?,
        trigger_kind: TriggerKind::parse(&trigger_kind)
            .map_err(|e| StoreError::invalid("trigger_kind", e.value))?,
        trigger_time: u64::try_from(trigger_time)
            .map_err(|_| StoreError::invalid("trigger_time", trigger_time.to_string()))?,
        trigger_condition: get(row, "trigger_condition")?,
        content: parse_json("scenario content", &content)?,
        duration: u64::try_from(duration)
            .map_err(|_| StoreError::invalid("duration", duration.to_string()))?,
        auto_advance: get(row, "auto_advance")?,
        environment_id: get(row, "environment_id")?,
        metadata: parse_metadata("scenario metadata", &metadata)?,
        status: ScenarioStatus::parse(&status)
            .map_err(|e| StoreError::invalid("status", e.value))?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

#[async_trait]
impl TimelineStore for PgStore {
    async fn upsert_timeline(&self, timeline: &Timeline) -> Result<(), StoreError> {
        let metadata = JsonValue::Object(timeline.metadata.clone()).to_string();
        sqlx::query(
            r"
            INSERT INTO timelines
                (id, name, description, is_active, is_paused, start_time,
                 current_index, elapsed_secs, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                is_active = EXCLUDED.is_active,
                is_paused = EXCLUDED.is_paused,
                start_time = EXCLUDED.start_time,
                current_index = EXCLUDED.current_index,
                elapsed_secs = EXCLUDED.elapsed_secs,
                metadata = EXCLUDED.metadata,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(timeline.id.to_string())
        .bind(&timeline.name)
        .bind(&timeline.description)
        .bind(timeline.is_active)
        .bind(timeline.is_paused)
        .bind(timeline.start_time)
        .bind(timeline.current_index)
        .bind(timeline.elapsed_secs as i64)
        .bind(metadata)
        .bind(timeline.created_at)
        .bind(timeline.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::storage)?;
        Ok(())
    }

    async fn fetch_timeline(&self, id: TimelineId) -> Result<Option<Timeline>, StoreError> {
        let row = sqlx::query("SELECT * FROM timelines WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::storage)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut timeline = timeline_from_row(&row)?;

        // Same sort key as the in-memory adapter; creation time breaks
        // trigger time ties, so same-time scenarios keep insertion order.
        let rows = sqlx::query(
            "SELECT * FROM scenarios WHERE timeline_id = $1 \
             ORDER BY trigger_time ASC, created_at ASC, id ASC",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::storage)?;

        timeline.scenarios = rows
            .iter()
            .map(scenario_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(timeline))
    }

    async fn delete_timeline(&self, id: TimelineId) -> Result<(), StoreError> {
        // Scenarios cascade via the foreign key; the log is pruned here.
        sqlx::query("DELETE FROM scenario_log WHERE timeline_id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StoreError::storage)?;
        sqlx::query("DELETE FROM timelines WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StoreError::storage)?;
        Ok(())
    }

    async fn upsert_scenario(
        &self,
        timeline_id: TimelineId,
        scenario: &Scenario,
    ) -> Result<(), StoreError> {
        let metadata = JsonValue::Object(scenario.metadata.clone()).to_string();
        sqlx::query(
            r"
            INSERT INTO scenarios
                (id, timeline_id, name, description, kind, trigger_kind,
                 trigger_time, trigger_condition, content, duration,
                 auto_advance, environment_id, metadata, status,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                kind = EXCLUDED.kind,
                trigger_kind = EXCLUDED.trigger_kind,
                trigger_time = EXCLUDED.trigger_time,
                trigger_condition = EXCLUDED.trigger_condition,
                content = EXCLUDED.content,
                duration = EXCLUDED.duration,
                auto_advance = EXCLUDED.auto_advance,
                environment_id = EXCLUDED.environment_id,
                metadata = EXCLUDED.metadata,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(scenario.id.to_string())
        .bind(timeline_id.to_string())
        .bind(&scenario.name)
        .bind(&scenario.description)
        .bind(scenario.kind.as_str())
        .bind(scenario.trigger_kind.as_str())
        .bind(scenario.trigger_time as i64)
        .bind(&scenario.trigger_condition)
        .bind(scenario.content.to_string())
        .bind(scenario.duration as i64)
        .bind(scenario.auto_advance)
        .bind(&scenario.environment_id)
        .bind(metadata)
        .bind(scenario.status.as_str())
        .bind(scenario.created_at)
        .bind(scenario.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::storage)?;
        Ok(())
    }

    async fn delete_scenario(&self, id: ScenarioId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM scenarios WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StoreError::storage)?;
        Ok(())
    }

    async fn append_log(&self, entry: &LogEntry) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO scenario_log
                (id, timeline_id, scenario_id, action, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(entry.id.to_string())
        .bind(entry.timeline_id.to_string())
        .bind(entry.scenario_id.map(|id| id.to_string()))
        .bind(entry.action.as_str())
        .bind(&entry.details)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await
        .map_err(StoreError::storage)?;
        Ok(())
    }

    async fn list_timeline_ids(&self) -> Result<Vec<TimelineId>, StoreError> {
        let rows = sqlx::query("SELECT id FROM timelines ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::storage)?;

        rows.iter()
            .map(|row| {
                let id: String = get(row, "id")?;
                parse_timeline_id(&id)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_must_be_an_object() {
        let err = parse_metadata("timeline metadata", "[1, 2]").expect_err("should fail");
        assert!(matches!(err, StoreError::InvalidRecord { .. }));

        let ok = parse_metadata("timeline metadata", r#"{"mood": "tense"}"#).unwrap();
        assert_eq!(ok.get("mood").and_then(|v| v.as_str()), Some("tense"));
    }

    #[test]
    fn malformed_ids_are_invalid_records() {
        assert!(matches!(
            parse_timeline_id("???"),
            Err(StoreError::InvalidRecord { .. })
        ));
        assert!(parse_scenario_id(&ScenarioId::new().to_string()).is_ok());
    }
}
