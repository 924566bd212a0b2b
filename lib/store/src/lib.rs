//! Persistence adapter for scene-director.
//!
//! This crate provides:
//!
//! - **`TimelineStore`**: the durable storage contract for timelines, their
//!   owned scenarios, and the append-only execution log
//! - **`MemoryStore`**: an in-process implementation for tests and embedding
//! - **`PgStore`**: a Postgres implementation backed by sqlx

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::TimelineStore;
