//! Core domain types and utilities for the scene-director engine.
//!
//! This crate provides the foundational ID types and error handling
//! used throughout the scene-director timeline scheduler.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{LogEntryId, ParseIdError, ScenarioId, TimelineId};
