//! Agent step executor — delegates the turn to the registered
//! [`AgentExecutor`] and interns whatever value comes back.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;

use flowclaw_core::{AgentExecutor, AgentInput, FlowClawError, Result};

use crate::context::Context;
use crate::executors::{primary_input, StepExecution, StepExecutor};
use crate::model::{StepKind, WorkflowStep};

pub struct AgentStepExecutor {
    agents: Arc<dyn AgentExecutor>,
}

impl AgentStepExecutor {
    pub fn new(agents: Arc<dyn AgentExecutor>) -> Self {
        Self { agents }
    }
}

#[async_trait]
impl StepExecutor for AgentStepExecutor {
    fn kind(&self) -> StepKind {
        StepKind::Agent
    }

    async fn run(
        &self,
        step: &WorkflowStep,
        context: &Context,
        deadline: Instant,
    ) -> Result<StepExecution> {
        let agent_name = step.agent.as_deref().filter(|name| !name.is_empty()).ok_or_else(|| {
            FlowClawError::precondition(&step.id, "agent step has no `agent` name")
        })?;

        let primary = primary_input(step, context)?.clone();
        let input = AgentInput::new(primary, context.results_map());

        // The returned value is opaque to the executor; later steps interpret it.
        let value = self.agents.execute(agent_name, &input, deadline).await?;
        Ok(StepExecution::value(value))
    }
}
