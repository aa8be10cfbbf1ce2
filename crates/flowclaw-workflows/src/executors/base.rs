//! Retry/timeout wrapper around the concrete step executors.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::warn;

use flowclaw_core::EngineConfig;

use crate::context::Context;
use crate::executors::{StepExecutor, StepResult};
use crate::model::WorkflowStep;

/// Composes every concrete executor with attempt counting, per-attempt
/// deadlines, and exponential backoff between retriable failures.
pub struct BaseExecutor {
    config: EngineConfig,
}

impl BaseExecutor {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Run a step to its final [`StepResult`]. With `max_retries = R` the
    /// executor is invoked at most `R + 1` times; non-retriable failures
    /// (preconditions, expression errors) end the loop immediately.
    pub async fn execute(
        &self,
        executor: &dyn StepExecutor,
        step: &WorkflowStep,
        context: &Context,
    ) -> StepResult {
        let started = Instant::now();
        let timeout = Duration::from_millis(
            step.timeout_ms.unwrap_or(self.config.default_step_timeout_ms),
        );
        let max_attempts = step.max_retries.unwrap_or(self.config.default_max_retries) + 1;
        let base_delay = step
            .retry_delay_ms
            .unwrap_or(self.config.default_retry_delay_ms);

        let mut attempt = 1;
        loop {
            // Each attempt gets its own full timeout budget.
            let deadline = Instant::now() + timeout;
            match executor.run(step, context, deadline).await {
                Ok(execution) => {
                    return StepResult {
                        step_id: step.id.clone(),
                        outcome: Ok(execution),
                        duration_ms: started.elapsed().as_millis() as u64,
                        attempts: attempt,
                    };
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.retry_delay_ms(base_delay, attempt);
                    warn!(
                        "↻ step '{}' attempt {}/{} failed: {} (retrying in {}ms)",
                        step.id, attempt, max_attempts, err, delay
                    );
                    sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(err) => {
                    return StepResult {
                        step_id: step.id.clone(),
                        outcome: Err(err),
                        duration_ms: started.elapsed().as_millis() as u64,
                        attempts: attempt,
                    };
                }
            }
        }
    }
}
