//! The external collaborator boundary: an LLM-driven Agent. Its actual
//! planning/reasoning is out of scope for this core; callers provide an
//! implementation and the engine only ever talks to it through this
//! trait, never by reaching into its internals.
use async_trait::async_trait;

use crate::cacheable::RecordedAction;
use crate::error::SessionError;
use crate::model::{StepObservation, StepOutcome};

#[async_trait]
pub trait AgentDriver: Send + Sync {
    /// Performs one observe-think-act iteration and reports back what
    /// happened plus what the loop should do next.
    async fn step(
        &self,
        step: u32,
        history: &[StepObservation],
    ) -> Result<(StepObservation, StepOutcome, Vec<RecordedAction>), SessionError>;

    /// Appends `message` as a new task for the Agent to pursue on its
    /// next step. Returns `false` if this Agent does not expose a
    /// task-append capability (a no-op, not an error).
    async fn add_task(&self, message: &str) -> bool;
}
