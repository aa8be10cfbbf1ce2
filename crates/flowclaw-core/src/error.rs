//! Unified error types for FlowClaw.

use thiserror::Error;

/// Result type alias using FlowClawError.
pub type Result<T> = std::result::Result<T, FlowClawError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowClawError {
    // Validation errors — the workflow never runs
    #[error("Workflow `{workflow_id}` failed validation: {details}")]
    Validation {
        workflow_id: String,
        details: String,
    },

    // Referential errors — routing to a step or executor that does not exist
    #[error("Step `{step_id}` routes to unknown step `{target}`")]
    Reference { step_id: String, target: String },

    #[error("No executor registered for step kind `{kind}` (known kinds: {known})")]
    ExecutorMissing { kind: String, known: String },

    #[error("Step `{step_id}` precondition failed: {reason}")]
    Precondition { step_id: String, reason: String },

    // Expression errors
    #[error("Expression `{expression}` failed: {cause} (available variables: {available})")]
    Expression {
        expression: String,
        cause: String,
        available: String,
    },

    // Agent and session errors
    #[error("Agent `{name}` not found (available agents: {available})")]
    AgentResolution { name: String, available: String },

    #[error("Session {operation} failed: {reason}")]
    Session { operation: String, reason: String },

    // Bound errors
    #[error("Timed out after {elapsed_ms}ms (limit {limit_ms}ms): {context}")]
    Timeout {
        limit_ms: u64,
        elapsed_ms: u64,
        context: String,
    },

    #[error("Guard `{guard}` refused execution: {reason}")]
    Guard { guard: String, reason: String },

    #[error("Workflow exceeded max iterations ({max_iterations}); recent steps: {recent}")]
    IterationBound { max_iterations: u32, recent: String },

    #[error(
        "Workflow exceeded max duration ({max_duration_ms}ms) after {steps_completed} steps, last at `{last_step}`"
    )]
    DurationBound {
        max_duration_ms: u64,
        steps_completed: usize,
        last_step: String,
    },

    #[error("{0}")]
    Other(String),
}

impl FlowClawError {
    pub fn validation(workflow_id: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Validation {
            workflow_id: workflow_id.into(),
            details: details.into(),
        }
    }

    pub fn precondition(step_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Precondition {
            step_id: step_id.into(),
            reason: reason.into(),
        }
    }

    pub fn session(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Session {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn guard(guard: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Guard {
            guard: guard.into(),
            reason: reason.into(),
        }
    }

    /// Whether a failed step attempt is worth re-running.
    ///
    /// Session and timeout failures are transient; everything else is
    /// deterministic and would fail identically on the next attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Session { .. } | Self::Timeout { .. } | Self::Other(_)
        )
    }
}
