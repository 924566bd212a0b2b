//! The active session: one running timeline plus its worker state.

use chrono::{DateTime, Utc};
use scene_director_core::ScenarioId;
use scene_director_timeline::Timeline;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Session-local state for the single running timeline.
///
/// The session object lives behind the engine's mutex; the tick loop and the
/// control surface both mutate it under that lock, so a tick never observes
/// a torn update. The worker and any auto-completion timers are supervised:
/// their handles live here and are aborted when the session ends, so timers
/// never leak across start/stop cycles.
pub(crate) struct Session {
    /// The working copy of the running timeline.
    pub timeline: Timeline,
    /// Wall-clock reference point for elapsed-time accrual.
    pub last_tick: DateTime<Utc>,
    /// Shutdown signal for the worker task.
    pub shutdown: watch::Sender<bool>,
    /// The worker task handle, joined (bounded) on stop.
    pub worker: Option<JoinHandle<()>>,
    /// Auto-completion timer handles, aborted when the session ends.
    pub timers: Vec<JoinHandle<()>>,
    /// Skip target that fires on the next tick regardless of trigger kind.
    pub forced_target: Option<ScenarioId>,
}

impl Session {
    /// Creates a session for a freshly started timeline, returning the
    /// shutdown receiver for the worker task.
    pub fn new(timeline: Timeline, now: DateTime<Utc>) -> (Self, watch::Receiver<bool>) {
        let (shutdown, rx) = watch::channel(false);
        (
            Self {
                timeline,
                last_tick: now,
                shutdown,
                worker: None,
                timers: Vec::new(),
                forced_target: None,
            },
            rx,
        )
    }

    /// Tells the worker to exit after its current tick.
    pub fn signal_shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Aborts all pending auto-completion timers.
    pub fn abort_timers(&mut self) {
        for timer in self.timers.drain(..) {
            timer.abort();
        }
    }
}
