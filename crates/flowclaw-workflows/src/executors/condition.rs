//! Condition step executor — boolean branch selection.

use async_trait::async_trait;
use tokio::time::Instant;

use flowclaw_core::{FlowClawError, Result};
use flowclaw_expr::evaluate;

use crate::context::Context;
use crate::executors::{expression_scope, StepExecution, StepExecutor};
use crate::model::{StepKind, WorkflowStep};

pub struct ConditionStepExecutor;

#[async_trait]
impl StepExecutor for ConditionStepExecutor {
    fn kind(&self) -> StepKind {
        StepKind::Condition
    }

    async fn run(
        &self,
        step: &WorkflowStep,
        context: &Context,
        _deadline: Instant,
    ) -> Result<StepExecution> {
        let expression = step
            .condition
            .as_deref()
            .filter(|expr| !expr.is_empty())
            .ok_or_else(|| {
                FlowClawError::precondition(&step.id, "condition step has no expression")
            })?;

        let scope = expression_scope(step, context)?;
        let value = evaluate(expression, &scope)?;

        // Only a real boolean routes; anything else is a step-level error so
        // on_error handling applies uniformly.
        let taken = match value {
            serde_json::Value::Bool(b) => b,
            other => {
                let mut available: Vec<&str> = scope.keys().map(String::as_str).collect();
                available.sort_unstable();
                return Err(FlowClawError::Expression {
                    expression: expression.to_string(),
                    cause: format!("condition must evaluate to a boolean, got {other}"),
                    available: available.join(", "),
                });
            }
        };

        // The stored result is the boolean itself, addressable by later steps.
        let value = serde_json::Value::Bool(taken);
        if taken {
            let target = step.then_branch.as_deref().ok_or_else(|| {
                FlowClawError::precondition(&step.id, "condition step has no `then` branch")
            })?;
            Ok(StepExecution::goto(value, target))
        } else {
            match step.else_branch.as_deref() {
                Some(target) => Ok(StepExecution::goto(value, target)),
                None => Ok(StepExecution::terminal(value)),
            }
        }
    }
}
