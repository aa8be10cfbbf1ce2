//! Pre-built workflow templates — ready to register out of the box.

use crate::model::{WorkflowDefinition, WorkflowStep};

/// Get all built-in workflow templates.
pub fn builtin_workflows() -> Vec<WorkflowDefinition> {
    vec![feature_delivery(), review_gate(), summarize_report()]
}

/// Plan → build → test, each step fed the previous step's result.
pub fn feature_delivery() -> WorkflowDefinition {
    WorkflowDefinition::new("feature_delivery")
        .with_max_iterations(10)
        .add_step(
            WorkflowStep::agent("plan", "plan")
                .with_timeout_ms(120_000)
                .with_on_error("report"),
        )
        .add_step(
            WorkflowStep::agent("build", "build")
                .with_input("plan")
                .with_retries(1)
                .with_on_error("report"),
        )
        .add_step(
            WorkflowStep::agent("test", "test")
                .with_input("build")
                .with_on_error("report")
                .with_end(),
        )
        .add_step(WorkflowStep::transform(
            "report",
            "{delivered: false, failed: true}",
        ))
}

/// Run tests, then branch: ship on green, loop back to a fix pass on red.
pub fn review_gate() -> WorkflowDefinition {
    WorkflowDefinition::new("review_gate")
        .with_max_iterations(12)
        .add_step(WorkflowStep::agent("test", "test").with_on_error("fix"))
        .add_step(
            WorkflowStep::condition("gate", "test.passed === true", "ship").with_else("fix"),
        )
        .add_step(WorkflowStep::agent("ship", "release").with_end())
        .add_step(WorkflowStep::agent("fix", "build").with_next("test"))
}

/// One agent pass condensed into a small structured summary.
pub fn summarize_report() -> WorkflowDefinition {
    WorkflowDefinition::new("summarize_report")
        .add_step(WorkflowStep::agent("research", "general").with_on_error("empty"))
        .add_step(
            WorkflowStep::transform(
                "digest",
                "{summary: research.result, source: 'research'}",
            )
            .with_end(),
        )
        .add_step(WorkflowStep::transform("empty", "{summary: '', source: 'none'}"))
}
