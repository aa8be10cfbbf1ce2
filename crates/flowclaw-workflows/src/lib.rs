//! # FlowClaw Workflows
//!
//! The workflow engine — drive a labeled graph of steps to a terminal state,
//! threading results between steps under retry, timeout, and guard bounds.
//!
//! ## Step kinds
//! | Kind | Behavior |
//! |------|----------|
//! | `agent` | Run a named agent through the host session API |
//! | `transform` | Evaluate an expression over prior results |
//! | `condition` | Evaluate a boolean expression and branch `then`/`else` |
//!
//! ## Example
//! ```rust,no_run
//! use flowclaw_workflows::{WorkflowDefinition, WorkflowStep};
//!
//! let workflow = WorkflowDefinition::new("delivery")
//!     .add_step(WorkflowStep::agent("plan", "plan"))
//!     .add_step(WorkflowStep::agent("build", "build").with_input("plan"))
//!     .add_step(WorkflowStep::transform("files", "build.files.length"));
//! ```

pub mod context;
pub mod engine;
pub mod executors;
pub mod guards;
pub mod model;
pub mod templates;
pub mod validate;

pub use context::{Context, RunMetadata};
pub use engine::{WorkflowEngine, WorkflowResult};
pub use executors::{
    AgentStepExecutor, BaseExecutor, ConditionStepExecutor, StepExecution, StepExecutor,
    StepResult, StepRoute, TransformStepExecutor,
};
pub use guards::{CircularDependencyGuard, Guard, MaxErrorGuard};
pub use model::{NextPointer, StepKind, WorkflowDefinition, WorkflowStep};
pub use templates::builtin_workflows;
pub use validate::{parse_document, validate, ValidationReport};
