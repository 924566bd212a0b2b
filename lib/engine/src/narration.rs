//! Narration sink: human-readable progress lines from the engine.
//!
//! The engine prefixes every line with `[Director]` for log correlation.
//! Delivery is best-effort and fire-and-forget; a failing or absent sink
//! must never abort scheduling, so the trait has no error channel.

use async_trait::async_trait;

/// Receives human-readable progress lines.
///
/// Implementations must not call back into the engine; they are passive
/// listeners and may be invoked while the engine holds its session lock.
#[async_trait]
pub trait NarrationSink: Send + Sync {
    /// Emits one line of narration.
    async fn emit(&self, line: &str);
}

/// A sink that discards everything.
pub struct NullSink;

#[async_trait]
impl NarrationSink for NullSink {
    async fn emit(&self, _line: &str) {}
}

/// Forwards narration into the `tracing` log stream at info level.
pub struct TracingSink;

#[async_trait]
impl NarrationSink for TracingSink {
    async fn emit(&self, line: &str) {
        tracing::info!(target: "narration", "{line}");
    }
}
