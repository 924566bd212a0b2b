//! Scenario consumer: the external callback reacting to activations.

use crate::engine::DirectorEngine;
use crate::error::ConsumerError;
use async_trait::async_trait;
use scene_director_timeline::Scenario;

/// Reacts to a newly active scenario, e.g. to steer dialogue generation.
///
/// Invoked exactly once per activation, after the engine has released its
/// session lock, so the consumer may call back into the engine handle it
/// receives (to advance, skip, or query). Errors are logged by the engine
/// and swallowed; they never reach the tick loop.
#[async_trait]
pub trait ScenarioConsumer: Send + Sync {
    /// Called with a snapshot of the scenario as it became active and a
    /// handle to the engine that activated it.
    async fn scenario_activated(
        &self,
        scenario: &Scenario,
        engine: &DirectorEngine,
    ) -> Result<(), ConsumerError>;
}

/// A consumer that ignores every activation.
pub struct NoopConsumer;

#[async_trait]
impl ScenarioConsumer for NoopConsumer {
    async fn scenario_activated(
        &self,
        _scenario: &Scenario,
        _engine: &DirectorEngine,
    ) -> Result<(), ConsumerError> {
        Ok(())
    }
}
