//! Step executors — one pure strategy per step kind, composed with the
//! retry/timeout wrapper in [`base`].

pub mod agent;
pub mod base;
pub mod condition;
pub mod transform;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::time::Instant;

use flowclaw_core::{FlowClawError, Result};

use crate::context::Context;
use crate::model::{StepKind, WorkflowStep};

pub use agent::AgentStepExecutor;
pub use base::BaseExecutor;
pub use condition::ConditionStepExecutor;
pub use transform::TransformStepExecutor;

/// Where the engine goes after a successful step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepRoute {
    /// Use `next`, or declaration order, or terminate.
    Follow,
    /// Jump to a specific step (condition branches).
    Goto(String),
    /// End the workflow successfully.
    Terminal,
}

/// A successful step execution: the value to intern plus routing intent.
#[derive(Debug, Clone, PartialEq)]
pub struct StepExecution {
    pub value: Value,
    pub route: StepRoute,
}

impl StepExecution {
    pub fn value(value: Value) -> Self {
        Self {
            value,
            route: StepRoute::Follow,
        }
    }

    pub fn goto(value: Value, target: &str) -> Self {
        Self {
            value,
            route: StepRoute::Goto(target.to_string()),
        }
    }

    pub fn terminal(value: Value) -> Self {
        Self {
            value,
            route: StepRoute::Terminal,
        }
    }
}

/// Final report for one step, after retries.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step_id: String,
    pub outcome: Result<StepExecution>,
    pub duration_ms: u64,
    pub attempts: u32,
}

impl StepResult {
    pub fn ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// One strategy per step kind. `deadline` is when the current attempt times
/// out; only suspending executors need to look at it.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    fn kind(&self) -> StepKind;

    async fn run(
        &self,
        step: &WorkflowStep,
        context: &Context,
        deadline: Instant,
    ) -> Result<StepExecution>;
}

/// The step's primary input: the result of the step named by `input`, or the
/// raw workflow input. A dangling reference is a non-retriable precondition
/// failure.
pub(crate) fn primary_input<'a>(step: &WorkflowStep, context: &'a Context) -> Result<&'a Value> {
    match &step.input {
        Some(source) => context.get_result(source).ok_or_else(|| {
            FlowClawError::precondition(
                &step.id,
                format!("input references step `{source}` which has no result yet"),
            )
        }),
        None => Ok(context.input()),
    }
}

/// Evaluation scope for transform and condition steps: `input` plus one key
/// per completed step id.
pub(crate) fn expression_scope(
    step: &WorkflowStep,
    context: &Context,
) -> Result<Map<String, Value>> {
    let primary = primary_input(step, context)?.clone();
    let mut scope = context.results_map();
    scope.insert("input".to_string(), primary);
    Ok(scope)
}
