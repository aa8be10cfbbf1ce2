//! Guards — check-only objects the engine consults before every step.
//!
//! A guard never mutates state; it either passes or refuses the run with a
//! diagnostic. Guards are additive: every registered guard runs every
//! iteration.

use std::collections::HashMap;

use flowclaw_core::{FlowClawError, Result};

use crate::context::Context;
use crate::model::WorkflowDefinition;

pub trait Guard: Send + Sync {
    fn name(&self) -> &str;
    fn check(&self, context: &Context, workflow: &WorkflowDefinition) -> Result<()>;
}

/// Refuses a run once the recorded step errors reach a threshold. Catches
/// workflows that keep "recovering" through `on_error` without progress.
pub struct MaxErrorGuard {
    threshold: usize,
}

impl MaxErrorGuard {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }
}

impl Default for MaxErrorGuard {
    fn default() -> Self {
        Self::new(10)
    }
}

impl Guard for MaxErrorGuard {
    fn name(&self) -> &str {
        "max-errors"
    }

    fn check(&self, context: &Context, _workflow: &WorkflowDefinition) -> Result<()> {
        let count = context.error_count();
        if count >= self.threshold {
            return Err(FlowClawError::guard(
                self.name(),
                format!(
                    "{count} step errors reached the threshold of {} (steps: {})",
                    self.threshold,
                    context.error_steps().join(", ")
                ),
            ));
        }
        Ok(())
    }
}

/// Refuses a run when one step id keeps reappearing — a tight cycle caught
/// well before the workflow's iteration bound would trip.
pub struct CircularDependencyGuard {
    max_visits: usize,
}

impl CircularDependencyGuard {
    pub fn new(max_visits: usize) -> Self {
        Self { max_visits }
    }
}

impl Default for CircularDependencyGuard {
    fn default() -> Self {
        Self::new(10)
    }
}

impl Guard for CircularDependencyGuard {
    fn name(&self) -> &str {
        "circular-dependency"
    }

    fn check(&self, context: &Context, _workflow: &WorkflowDefinition) -> Result<()> {
        let mut visits: HashMap<&str, usize> = HashMap::new();
        for step_id in &context.metadata().previous_steps {
            *visits.entry(step_id.as_str()).or_default() += 1;
        }
        if let Some((step_id, count)) = visits
            .into_iter()
            .filter(|(_, count)| *count > self.max_visits)
            .max_by_key(|(_, count)| *count)
        {
            return Err(FlowClawError::guard(
                self.name(),
                format!(
                    "step `{step_id}` visited {count} times (limit {})",
                    self.max_visits
                ),
            ));
        }
        Ok(())
    }
}
