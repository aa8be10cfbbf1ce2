//! Transform step executor — pure expression evaluation, no suspension.

use async_trait::async_trait;
use tokio::time::Instant;

use flowclaw_core::{FlowClawError, Result};
use flowclaw_expr::evaluate;

use crate::context::Context;
use crate::executors::{expression_scope, StepExecution, StepExecutor};
use crate::model::{StepKind, WorkflowStep};

pub struct TransformStepExecutor;

#[async_trait]
impl StepExecutor for TransformStepExecutor {
    fn kind(&self) -> StepKind {
        StepKind::Transform
    }

    async fn run(
        &self,
        step: &WorkflowStep,
        context: &Context,
        _deadline: Instant,
    ) -> Result<StepExecution> {
        let expression = step
            .transform
            .as_deref()
            .filter(|expr| !expr.is_empty())
            .ok_or_else(|| {
                FlowClawError::precondition(&step.id, "transform step has no expression")
            })?;

        let scope = expression_scope(step, context)?;
        let value = evaluate(expression, &scope)?;
        Ok(StepExecution::value(value))
    }
}
