//! Scheduler engine for scene-director.
//!
//! Owns the single running session: a background worker ticks the timeline
//! forward, evaluates triggers, and emits narration, while the control
//! surface lets callers start, pause, skip, and advance. Timeline and
//! scenario CRUD lives in the [`TimelineRepository`].

mod consumer;
mod engine;
mod error;
mod narration;
mod repository;
mod session;

pub use consumer::{NoopConsumer, ScenarioConsumer};
pub use engine::{Config, DirectorEngine, DirectorStats};
pub use error::{ConsumerError, DirectorError};
pub use narration::{NarrationSink, NullSink, TracingSink};
pub use repository::{TimelineRepository, TimelineSummary};
