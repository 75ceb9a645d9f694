//! Agent Loop: drives up to `max_steps` observe-think-act iterations
//! against a caller-supplied step function, consuming a
//! [`StepObservation`] through a defined callback contract rather than
//! probing an Agent object's internals.
use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::completion::{is_complete, MIN_STEP_FOR_EARLY_STOP};
use crate::error::SessionError;
use crate::model::{StepObservation, StepOutcome};

const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;

#[derive(Debug, Clone)]
pub enum AgentLoopOutcome {
    Completed { message: String, steps: u32 },
    Failed { message: String, steps: u32 },
    Cancelled { steps: u32 },
    MaxStepsReached { steps: u32 },
}

pub struct AgentLoop {
    cancel: CancellationToken,
    max_steps: u32,
    max_consecutive_failures: u32,
}

impl AgentLoop {
    pub fn new(cancel: CancellationToken, max_steps: u32) -> Self {
        Self {
            cancel,
            max_steps,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }

    /// Runs the loop. `step_fn` performs the observe/think/act work for
    /// one step and returns the resulting observation plus what the
    /// loop should do next.
    pub async fn run<F, Fut>(&self, mut step_fn: F) -> AgentLoopOutcome
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<(StepObservation, StepOutcome), SessionError>>,
    {
        let mut step = 0u32;
        let mut consecutive_failures = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return AgentLoopOutcome::Cancelled { steps: step };
            }

            step += 1;
            if step > self.max_steps {
                return AgentLoopOutcome::MaxStepsReached { steps: step - 1 };
            }

            match step_fn(step).await {
                Ok((observation, outcome)) => {
                    consecutive_failures = 0;

                    match outcome {
                        StepOutcome::Cancel => return AgentLoopOutcome::Cancelled { steps: step },
                        StepOutcome::Stop => {
                            return AgentLoopOutcome::Completed {
                                message: observation
                                    .evaluation
                                    .unwrap_or_else(|| observation.goal.clone()),
                                steps: step,
                            }
                        }
                        StepOutcome::Continue => {
                            if step >= MIN_STEP_FOR_EARLY_STOP
                                && is_complete(observation.evaluation.as_deref(), &observation.goal)
                            {
                                return AgentLoopOutcome::Completed {
                                    message: observation
                                        .evaluation
                                        .unwrap_or_else(|| observation.goal.clone()),
                                    steps: step,
                                };
                            }
                        }
                    }
                }
                Err(err) => {
                    consecutive_failures += 1;
                    if consecutive_failures >= self.max_consecutive_failures {
                        return AgentLoopOutcome::Failed {
                            message: err.message,
                            steps: step,
                        };
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stops_early_on_completion_phrase_after_min_steps() {
        let cancel = CancellationToken::new();
        let loop_ = AgentLoop::new(cancel, 10);
        let outcome = loop_
            .run(|step| async move {
                let observation = StepObservation {
                    goal: "none".to_string(),
                    evaluation: Some("task completed".to_string()),
                    url: "about:blank".into(),
                    ..Default::default()
                };
                let _ = step;
                Ok((observation, StepOutcome::Continue))
            })
            .await;

        match outcome {
            AgentLoopOutcome::Completed { steps, .. } => assert_eq!(steps, 3),
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reaches_max_steps_when_never_done() {
        let cancel = CancellationToken::new();
        let loop_ = AgentLoop::new(cancel, 2);
        let outcome = loop_
            .run(|_step| async move {
                Ok((
                    StepObservation {
                        goal: "keep going".into(),
                        ..Default::default()
                    },
                    StepOutcome::Continue,
                ))
            })
            .await;
        assert!(matches!(outcome, AgentLoopOutcome::MaxStepsReached { steps: 2 }));
    }

    #[tokio::test]
    async fn fails_after_max_consecutive_failures() {
        let cancel = CancellationToken::new();
        let loop_ = AgentLoop::new(cancel, 10);
        let outcome = loop_
            .run(|_step| async move { Err(SessionError::agent_runtime("boom")) })
            .await;
        match outcome {
            AgentLoopOutcome::Failed { steps, message } => {
                assert_eq!(steps, 3);
                assert_eq!(message, "boom");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_token_short_circuits_the_loop() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let loop_ = AgentLoop::new(cancel, 10);
        let outcome = loop_
            .run(|_step| async move {
                Ok((StepObservation::default(), StepOutcome::Continue))
            })
            .await;
        assert!(matches!(outcome, AgentLoopOutcome::Cancelled { steps: 0 }));
    }
}
