//! The scheduler engine: session ownership, tick loop, control surface.
//!
//! The engine owns at most one running timeline at a time. A background
//! worker task ticks on a fixed period; each tick accrues elapsed time,
//! evaluates the first pending scenario's trigger, and checks the terminal
//! condition. Control surface calls run on the caller's task and mutate the
//! same session object under the engine's mutex, so a tick never observes a
//! torn update.
//!
//! Scheduling rules:
//!
//! - At most one scenario activates per tick.
//! - Trigger evaluation is suppressed while any scenario is active; the
//!   single-active-scenario invariant holds by construction.
//! - `Condition` and `Manual` triggers never fire inside the loop; they
//!   progress through [`DirectorEngine::advance_next`], which the consumer
//!   drives.
//! - A failed persistence write inside the loop is logged and the tick
//!   continues; memory and store reconverge on the next successful write.

use crate::consumer::ScenarioConsumer;
use crate::error::DirectorError;
use crate::narration::NarrationSink;
use crate::repository::TimelineRepository;
use crate::session::Session;
use chrono::{DateTime, Utc};
use scene_director_core::{ScenarioId, TimelineId};
use scene_director_store::TimelineStore;
use scene_director_timeline::{
    LogAction, LogEntry, Scenario, ScenarioStatus, Timeline, TriggerKind,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// Scheduling policy constants.
#[derive(Debug, Clone)]
pub struct Config {
    /// Evaluation period of the tick loop.
    pub tick_interval: Duration,
    /// Bounded wait for the worker task to exit on stop.
    pub stop_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(2),
        }
    }
}

/// Aggregate observability snapshot of the running session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectorStats {
    /// The running timeline.
    pub timeline_id: TimelineId,
    /// Its display name.
    pub timeline_name: String,
    /// Whether the session is paused.
    pub is_paused: bool,
    /// Seconds accrued since start.
    pub elapsed_secs: u64,
    /// Total scenario count.
    pub total: usize,
    /// Scenarios still pending.
    pub pending: usize,
    /// Scenarios currently active (0 or 1).
    pub active: usize,
    /// Scenarios completed.
    pub completed: usize,
    /// Scenarios skipped.
    pub skipped: usize,
    /// Name of the scenario at the cursor, if any.
    pub current_scenario: Option<String>,
}

struct EngineInner {
    repository: TimelineRepository,
    sink: Arc<dyn NarrationSink>,
    consumer: Arc<dyn ScenarioConsumer>,
    config: Config,
    session: Mutex<Option<Session>>,
}

/// The director engine.
///
/// Cheap to clone; clones share the same session. The clone handed to the
/// scenario consumer is the engine handle it may steer the session with.
#[derive(Clone)]
pub struct DirectorEngine {
    inner: Arc<EngineInner>,
}

impl DirectorEngine {
    /// Creates an engine with default policy constants.
    #[must_use]
    pub fn new(
        store: Arc<dyn TimelineStore>,
        sink: Arc<dyn NarrationSink>,
        consumer: Arc<dyn ScenarioConsumer>,
    ) -> Self {
        Self::with_config(store, sink, consumer, Config::default())
    }

    /// Creates an engine with explicit policy constants.
    #[must_use]
    pub fn with_config(
        store: Arc<dyn TimelineStore>,
        sink: Arc<dyn NarrationSink>,
        consumer: Arc<dyn ScenarioConsumer>,
        config: Config,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                repository: TimelineRepository::new(store),
                sink,
                consumer,
                config,
                session: Mutex::new(None),
            }),
        }
    }

    /// Returns the repository for timeline and scenario CRUD.
    #[must_use]
    pub fn repository(&self) -> &TimelineRepository {
        &self.inner.repository
    }

    fn store(&self) -> Arc<dyn TimelineStore> {
        self.inner.repository.store()
    }

    /// Starts a timeline as the running session.
    ///
    /// Any other running timeline is stopped first. Run-time state is
    /// reset: cursor and clock cleared, every scenario back to pending.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the timeline has no scenarios, `NotFound` for an
    /// unknown id, `Storage` if persisting the reset state fails.
    #[instrument(skip(self))]
    pub async fn start(&self, id: TimelineId) -> Result<(), DirectorError> {
        let mut timeline = self.inner.repository.get(id).await?;
        if timeline.scenarios.is_empty() {
            return Err(DirectorError::invalid_state(
                "cannot start a timeline with no scenarios",
            ));
        }

        // Single active session: the previous timeline stops first.
        self.stop().await?;

        let now = Utc::now();
        timeline.reset_for_start(now);
        let store = self.store();
        store.upsert_timeline(&timeline).await?;
        for scenario in &timeline.scenarios {
            store.upsert_scenario(timeline.id, scenario).await?;
        }
        store
            .append_log(&LogEntry::timeline(
                id,
                LogAction::Start,
                format!("timeline '{}' started", timeline.name),
            ))
            .await?;

        let name = timeline.name.clone();
        let count = timeline.scenarios.len();
        let (mut session, shutdown_rx) = Session::new(timeline, now);
        session.worker = Some(self.spawn_worker(shutdown_rx));
        *self.inner.session.lock().await = Some(session);

        self.narrate(&format!("Timeline '{name}' started ({count} scenarios)"))
            .await;
        Ok(())
    }

    /// Pauses the running session; elapsed time stops accruing.
    ///
    /// The worker keeps ticking and observes the flag; pausing an already
    /// paused session is a no-op.
    pub async fn pause(&self) -> Result<(), DirectorError> {
        let mut guard = self.inner.session.lock().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| DirectorError::invalid_state("no active timeline"))?;
        if session.timeline.is_paused {
            return Ok(());
        }

        let now = Utc::now();
        session.timeline.is_paused = true;
        session.timeline.touch(now);
        let store = self.store();
        store.upsert_timeline(&session.timeline).await?;
        store
            .append_log(&LogEntry::timeline(
                session.timeline.id,
                LogAction::Pause,
                "session paused",
            ))
            .await?;
        let name = session.timeline.name.clone();
        drop(guard);

        self.narrate(&format!("Timeline '{name}' paused")).await;
        Ok(())
    }

    /// Resumes a paused session.
    ///
    /// Re-arms the wall-clock reference point so the paused interval never
    /// accrues into elapsed time.
    pub async fn resume(&self) -> Result<(), DirectorError> {
        let mut guard = self.inner.session.lock().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| DirectorError::invalid_state("no active timeline"))?;
        if !session.timeline.is_paused {
            return Ok(());
        }

        let now = Utc::now();
        session.timeline.is_paused = false;
        session.timeline.touch(now);
        session.last_tick = now;
        let store = self.store();
        store.upsert_timeline(&session.timeline).await?;
        store
            .append_log(&LogEntry::timeline(
                session.timeline.id,
                LogAction::Resume,
                "session resumed",
            ))
            .await?;
        let name = session.timeline.name.clone();
        drop(guard);

        self.narrate(&format!("Timeline '{name}' resumed")).await;
        Ok(())
    }

    /// Stops the running session. Safe to call when nothing is active.
    ///
    /// Signals the worker, waits for it within the configured bound (the
    /// worker is abandoned past the bound; it exits on its own after its
    /// current tick), aborts pending auto-completion timers, clears the
    /// active flags, and persists.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<(), DirectorError> {
        let mut session = {
            let mut guard = self.inner.session.lock().await;
            match guard.take() {
                Some(session) => session,
                None => return Ok(()),
            }
        };

        session.signal_shutdown();
        session.abort_timers();
        if let Some(worker) = session.worker.take() {
            match tokio::time::timeout(self.inner.config.stop_timeout, worker).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "session worker ended abnormally"),
                Err(_) => {
                    warn!("session worker did not stop within the bound; abandoning it");
                }
            }
        }

        let now = Utc::now();
        session.timeline.deactivate(now);
        let store = self.store();
        store.upsert_timeline(&session.timeline).await?;
        store
            .append_log(&LogEntry::timeline(
                session.timeline.id,
                LogAction::Stop,
                format!("timeline '{}' stopped", session.timeline.name),
            ))
            .await?;
        self.narrate(&format!("Timeline '{}' stopped", session.timeline.name))
            .await;
        Ok(())
    }

    /// Fast-forwards to a pending scenario.
    ///
    /// Every pending scenario strictly between the cursor and the target is
    /// skipped, the in-flight active scenario (if any) is completed, and the
    /// cursor parks one before the target so the next regular tick activates
    /// it. At most one scenario still activates per tick.
    #[instrument(skip(self))]
    pub async fn skip_to(&self, scenario_id: ScenarioId) -> Result<(), DirectorError> {
        let mut guard = self.inner.session.lock().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| DirectorError::invalid_state("no active timeline"))?;
        let Some(target) = session.timeline.scenario_index(scenario_id) else {
            return Err(DirectorError::not_found("scenario", scenario_id));
        };
        if session.timeline.scenarios[target].status != ScenarioStatus::Pending {
            return Err(DirectorError::invalid_state("skip target is not pending"));
        }

        let now = Utc::now();
        let timeline_id = session.timeline.id;

        // The in-flight scenario finishes now so the target can become the
        // single active scenario on the next tick.
        if let Ok(cur) = usize::try_from(session.timeline.current_index)
            && cur != target
            && session.timeline.scenarios.get(cur).map(|s| s.status)
                == Some(ScenarioStatus::Active)
        {
            self.complete_scenario(session, cur, now).await;
        }

        let first = usize::try_from(session.timeline.current_index + 1).unwrap_or(0);
        let store = self.store();
        for idx in first..target {
            if session.timeline.scenarios[idx].status == ScenarioStatus::Pending {
                session.timeline.scenarios[idx].skip(now);
                let snapshot = session.timeline.scenarios[idx].clone();
                store.upsert_scenario(timeline_id, &snapshot).await?;
                store
                    .append_log(&LogEntry::scenario(
                        timeline_id,
                        snapshot.id,
                        LogAction::Skip,
                        format!("scenario '{}' skipped", snapshot.name),
                    ))
                    .await?;
            }
        }

        session.timeline.current_index = target as i64 - 1;
        session.timeline.touch(now);
        // The target activates on the next tick regardless of its trigger
        // kind; a skipped-over predecessor would otherwise starve Sequence
        // and not-yet-due Time targets forever.
        session.forced_target = Some(scenario_id);
        store.upsert_timeline(&session.timeline).await?;
        let name = session.timeline.scenarios[target].name.clone();
        drop(guard);

        self.narrate(&format!("Skipping ahead to '{name}'")).await;
        Ok(())
    }

    /// Completes the current active scenario (if any) and immediately
    /// activates the next pending one in list order, regardless of its
    /// trigger kind.
    ///
    /// This is the only way `Condition`- and `Manual`-triggered scenarios
    /// progress.
    #[instrument(skip(self))]
    pub async fn advance_next(&self) -> Result<(), DirectorError> {
        let activated = {
            let mut guard = self.inner.session.lock().await;
            let session = guard
                .as_mut()
                .ok_or_else(|| DirectorError::invalid_state("no active timeline"))?;
            let now = Utc::now();

            if let Ok(cur) = usize::try_from(session.timeline.current_index)
                && session.timeline.scenarios.get(cur).map(|s| s.status)
                    == Some(ScenarioStatus::Active)
            {
                self.complete_scenario(session, cur, now).await;
            }

            match session.timeline.first_pending() {
                Some(idx) => Some(self.activate_scenario(session, idx, now).await),
                None => None,
            }
        };

        if let Some(scenario) = activated {
            self.notify_consumer(&scenario).await;
        }
        Ok(())
    }

    /// Completes the current active scenario without advancing; the next
    /// tick picks the following scenario.
    pub async fn complete_current(&self) -> Result<(), DirectorError> {
        let mut guard = self.inner.session.lock().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| DirectorError::invalid_state("no active timeline"))?;

        let current = usize::try_from(session.timeline.current_index)
            .ok()
            .filter(|&idx| {
                session.timeline.scenarios.get(idx).map(|s| s.status)
                    == Some(ScenarioStatus::Active)
            })
            .ok_or_else(|| DirectorError::invalid_state("no active scenario"))?;

        self.complete_scenario(session, current, Utc::now()).await;
        Ok(())
    }

    /// Deletes a timeline; if it is the running session, stops it first.
    pub async fn delete_timeline(&self, id: TimelineId) -> Result<(), DirectorError> {
        let is_session = {
            let guard = self.inner.session.lock().await;
            guard.as_ref().is_some_and(|s| s.timeline.id == id)
        };
        if is_session {
            self.stop().await?;
        }
        self.inner.repository.delete(id).await
    }

    /// Returns true while a session is installed.
    pub async fn is_running(&self) -> bool {
        self.inner.session.lock().await.is_some()
    }

    /// Returns true while the session is paused.
    pub async fn is_paused(&self) -> bool {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| s.timeline.is_paused)
    }

    /// Returns a snapshot of the running timeline.
    pub async fn active_timeline(&self) -> Option<Timeline> {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .map(|s| s.timeline.clone())
    }

    /// Returns aggregate statistics for the running session.
    pub async fn stats(&self) -> Option<DirectorStats> {
        let guard = self.inner.session.lock().await;
        guard.as_ref().map(|session| {
            let timeline = &session.timeline;
            DirectorStats {
                timeline_id: timeline.id,
                timeline_name: timeline.name.clone(),
                is_paused: timeline.is_paused,
                elapsed_secs: timeline.elapsed_secs,
                total: timeline.scenarios.len(),
                pending: timeline.count_status(ScenarioStatus::Pending),
                active: timeline.count_status(ScenarioStatus::Active),
                completed: timeline.count_status(ScenarioStatus::Completed),
                skipped: timeline.count_status(ScenarioStatus::Skipped),
                current_scenario: timeline.current_scenario().map(|s| s.name.clone()),
            }
        })
    }

    fn spawn_worker(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let engine = self.clone();
        let period = self.inner.config.tick_interval;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(period) => engine.tick_at(Utc::now()).await,
                }
            }
        })
    }

    /// One evaluation cycle against the given wall-clock instant.
    pub(crate) async fn tick_at(&self, now: DateTime<Utc>) {
        let mut activated = None;
        let mut finished_name = None;
        {
            let mut guard = self.inner.session.lock().await;
            let Some(session) = guard.as_mut() else { return };
            if session.timeline.is_paused {
                // The wall-clock reference stays put; resume re-arms it.
                return;
            }

            let delta = (now - session.last_tick).num_seconds();
            session.last_tick = now;
            if delta > 0 {
                session.timeline.elapsed_secs += delta as u64;
            }

            let has_active = session
                .timeline
                .scenarios
                .iter()
                .any(|s| s.status == ScenarioStatus::Active);
            if !has_active
                && let Some(idx) = session.timeline.first_pending()
            {
                let fires = {
                    let scenario = &session.timeline.scenarios[idx];
                    session.forced_target == Some(scenario.id)
                        || match scenario.trigger_kind {
                            TriggerKind::Time => {
                                session.timeline.elapsed_secs >= scenario.trigger_time
                            }
                            // Adjacency by list index, not trigger time.
                            TriggerKind::Sequence => {
                                idx == 0
                                    || session.timeline.scenarios[idx - 1].status
                                        == ScenarioStatus::Completed
                            }
                            TriggerKind::Condition | TriggerKind::Manual => false,
                        }
                };
                if fires {
                    activated = Some(self.activate_scenario(session, idx, now).await);
                }
            }

            if session.timeline.is_finished() {
                session.timeline.deactivate(now);
                session.signal_shutdown();
                session.abort_timers();
                self.persist_timeline(&session.timeline).await;
                self.append_log(LogEntry::timeline(
                    session.timeline.id,
                    LogAction::Stop,
                    format!("timeline '{}' finished", session.timeline.name),
                ))
                .await;
                finished_name = Some(session.timeline.name.clone());
                *guard = None;
            }
        }

        if let Some(name) = finished_name {
            self.narrate(&format!("Timeline '{name}' finished")).await;
        }
        if let Some(scenario) = activated {
            self.notify_consumer(&scenario).await;
        }
    }

    /// Completes a scenario through the deferred auto-advance path.
    ///
    /// Re-checks under the session lock that the scenario is still active;
    /// a manual advance or skip that won the race leaves it untouched.
    pub(crate) async fn auto_complete(&self, timeline_id: TimelineId, scenario_id: ScenarioId) {
        let mut guard = self.inner.session.lock().await;
        let Some(session) = guard.as_mut() else { return };
        if session.timeline.id != timeline_id {
            return;
        }
        let Some(idx) = session.timeline.scenario_index(scenario_id) else {
            return;
        };
        if session.timeline.scenarios[idx].status != ScenarioStatus::Active {
            return;
        }
        self.complete_scenario(session, idx, Utc::now()).await;
    }

    /// Transitions the scenario at `idx` to active and handles
    /// auto-completion. Returns a snapshot for consumer notification,
    /// which must happen after the session lock is released.
    async fn activate_scenario(
        &self,
        session: &mut Session,
        idx: usize,
        now: DateTime<Utc>,
    ) -> Scenario {
        session.timeline.current_index = idx as i64;
        session.timeline.scenarios[idx].activate(now);
        session.timeline.touch(now);
        session.forced_target = None;

        let snapshot = session.timeline.scenarios[idx].clone();
        let timeline_id = session.timeline.id;
        debug!(scenario = %snapshot.id, name = %snapshot.name, "scenario activated");

        self.persist_scenario(timeline_id, &snapshot).await;
        self.persist_timeline(&session.timeline).await;
        self.append_log(LogEntry::scenario(
            timeline_id,
            snapshot.id,
            LogAction::Trigger,
            format!("scenario '{}' triggered", snapshot.name),
        ))
        .await;
        self.narrate(&format!("Scenario '{}' begins", snapshot.name))
            .await;

        if snapshot.auto_advance {
            if snapshot.duration == 0 {
                // Zero duration completes synchronously, same tick.
                self.complete_scenario(session, idx, now).await;
            } else {
                let engine = self.clone();
                let scenario_id = snapshot.id;
                let duration = Duration::from_secs(snapshot.duration);
                session.timers.push(tokio::spawn(async move {
                    tokio::time::sleep(duration).await;
                    engine.auto_complete(timeline_id, scenario_id).await;
                }));
            }
        }

        snapshot
    }

    async fn complete_scenario(&self, session: &mut Session, idx: usize, now: DateTime<Utc>) {
        session.timeline.scenarios[idx].complete(now);
        let snapshot = session.timeline.scenarios[idx].clone();
        let timeline_id = session.timeline.id;

        self.persist_scenario(timeline_id, &snapshot).await;
        self.append_log(LogEntry::scenario(
            timeline_id,
            snapshot.id,
            LogAction::Complete,
            format!("scenario '{}' completed", snapshot.name),
        ))
        .await;
        self.narrate(&format!("Scenario '{}' complete", snapshot.name))
            .await;
    }

    async fn persist_timeline(&self, timeline: &Timeline) {
        if let Err(e) = self.store().upsert_timeline(timeline).await {
            warn!(error = %e, timeline = %timeline.id, "timeline persist failed; scheduling continues");
        }
    }

    async fn persist_scenario(&self, timeline_id: TimelineId, scenario: &Scenario) {
        if let Err(e) = self.store().upsert_scenario(timeline_id, scenario).await {
            warn!(error = %e, scenario = %scenario.id, "scenario persist failed; scheduling continues");
        }
    }

    async fn append_log(&self, entry: LogEntry) {
        if let Err(e) = self.store().append_log(&entry).await {
            warn!(error = %e, "log append failed");
        }
    }

    async fn narrate(&self, message: &str) {
        self.inner.sink.emit(&format!("[Director] {message}")).await;
    }

    async fn notify_consumer(&self, scenario: &Scenario) {
        if let Err(e) = self.inner.consumer.scenario_activated(scenario, self).await {
            warn!(error = %e, scenario = %scenario.id, "scenario consumer failed; scheduling continues");
        }
    }
}
