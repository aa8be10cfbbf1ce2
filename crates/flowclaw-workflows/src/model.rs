//! Workflow definitions — the typed model behind workflow documents.
//!
//! Wire format note: the step kind is stored under the field `type`
//! (`{"id": "plan", "type": "agent", "agent": "plan"}`); documents using a
//! `kind` field are rejected by schema validation.

use serde::{Deserialize, Serialize};

/// Kind of workflow step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Run a named agent through the host session API.
    Agent,
    /// Evaluate an expression over prior results.
    Transform,
    /// Evaluate a boolean expression and branch.
    Condition,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agent => write!(f, "agent"),
            Self::Transform => write!(f, "transform"),
            Self::Condition => write!(f, "condition"),
        }
    }
}

/// The `next` pointer of a step, distinguishing an absent field from an
/// explicit `"next": null`.
///
/// Absent means "fall through to the next step in declaration order";
/// explicit null ends the workflow after this step — the way a step jumped
/// to by a condition branch opts out of fallthrough.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NextPointer {
    /// Field omitted — declaration order decides.
    #[default]
    Unset,
    /// Explicit `null` — terminal after this step.
    End,
    /// Explicit step id.
    Step(String),
}

impl NextPointer {
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// The referenced step id, if one is named.
    pub fn step_id(&self) -> Option<&str> {
        match self {
            Self::Step(id) => Some(id),
            _ => None,
        }
    }
}

impl Serialize for NextPointer {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Step(id) => serializer.serialize_str(id),
            _ => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for NextPointer {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<String>::deserialize(deserializer)? {
            Some(id) => Self::Step(id),
            None => Self::End,
        })
    }
}

/// A single step in a workflow.
///
/// Routing: `next` names the follow-up step (defaulting to the next step in
/// declaration order, or terminal for the last); condition steps route
/// through `then`/`else` instead and ignore `next`. `on_error` names the
/// handler to jump to when the step permanently fails.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowStep {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    /// Agent name to resolve via the registry (agent steps).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Expression producing this step's result (transform steps).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    /// Boolean expression deciding the branch (condition steps).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Branch taken when the condition is true.
    #[serde(rename = "then", default, skip_serializing_if = "Option::is_none")]
    pub then_branch: Option<String>,
    /// Branch taken when the condition is false; terminal when absent.
    #[serde(rename = "else", default, skip_serializing_if = "Option::is_none")]
    pub else_branch: Option<String>,
    #[serde(default, skip_serializing_if = "NextPointer::is_unset")]
    pub next: NextPointer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<String>,
    /// Prior step whose result becomes this step's primary input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
}

impl WorkflowStep {
    fn bare(id: &str, kind: StepKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            agent: None,
            transform: None,
            condition: None,
            then_branch: None,
            else_branch: None,
            next: NextPointer::Unset,
            on_error: None,
            input: None,
            timeout_ms: None,
            max_retries: None,
            retry_delay_ms: None,
        }
    }

    /// An agent step.
    pub fn agent(id: &str, agent: &str) -> Self {
        let mut step = Self::bare(id, StepKind::Agent);
        step.agent = Some(agent.to_string());
        step
    }

    /// A transform step.
    pub fn transform(id: &str, expression: &str) -> Self {
        let mut step = Self::bare(id, StepKind::Transform);
        step.transform = Some(expression.to_string());
        step
    }

    /// A condition step branching to `then_id` when the expression is true.
    pub fn condition(id: &str, expression: &str, then_id: &str) -> Self {
        let mut step = Self::bare(id, StepKind::Condition);
        step.condition = Some(expression.to_string());
        step.then_branch = Some(then_id.to_string());
        step
    }

    pub fn with_else(mut self, else_id: &str) -> Self {
        self.else_branch = Some(else_id.to_string());
        self
    }

    pub fn with_next(mut self, next_id: &str) -> Self {
        self.next = NextPointer::Step(next_id.to_string());
        self
    }

    /// End the workflow after this step instead of falling through.
    pub fn with_end(mut self) -> Self {
        self.next = NextPointer::End;
        self
    }

    pub fn with_on_error(mut self, handler_id: &str) -> Self {
        self.on_error = Some(handler_id.to_string());
        self
    }

    pub fn with_input(mut self, source_step: &str) -> Self {
        self.input = Some(source_step.to_string());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_delay_ms = Some(delay_ms);
        self
    }
}

/// A complete workflow definition.
///
/// The first step in `steps` is the entry step. `max_iterations` and
/// `max_duration_ms` fall back to the engine configuration when omitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDefinition {
    pub id: String,
    pub steps: Vec<WorkflowStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_ms: Option<u64>,
}

impl WorkflowDefinition {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            steps: Vec::new(),
            max_iterations: None,
            max_duration_ms: None,
        }
    }

    pub fn add_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_max_duration_ms(mut self, max_duration_ms: u64) -> Self {
        self.max_duration_ms = Some(max_duration_ms);
        self
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Get a step by id.
    pub fn step(&self, id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|step| step.id == id)
    }

    /// The entry step (first in declaration order).
    pub fn entry(&self) -> Option<&WorkflowStep> {
        self.steps.first()
    }

    /// The step following `id` in declaration order, if any.
    pub fn declared_successor(&self, id: &str) -> Option<&str> {
        let index = self.steps.iter().position(|step| step.id == id)?;
        self.steps.get(index + 1).map(|step| step.id.as_str())
    }
}
