//! Timeline and scenario data model for the scene-director engine.
//!
//! This crate provides:
//!
//! - **Scenario**: a single schedulable unit with a trigger rule and
//!   lifecycle status
//! - **Timeline**: an ordered, named collection of scenarios plus its
//!   run-time cursor and clock state
//! - **Execution log**: append-only records of scenario lifecycle events

pub mod log;
pub mod scenario;
pub mod timeline;

pub use log::{LogAction, LogEntry};
pub use scenario::{
    Scenario, ScenarioKind, ScenarioSpec, ScenarioStatus, TriggerKind, UnknownVariant,
};
pub use timeline::Timeline;
