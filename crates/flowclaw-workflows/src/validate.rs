//! Workflow validation — a schema layer over raw documents and a semantic
//! layer over the typed model. Both are pure; the engine refuses to run any
//! workflow whose semantic report carries errors.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use serde_json::Value;

use flowclaw_expr::contains_forbidden_name;

use crate::model::{NextPointer, StepKind, WorkflowDefinition, WorkflowStep};

/// Steps beyond this count draw a warning — large graphs are usually a sign
/// the workflow should be split.
const LARGE_WORKFLOW_STEPS: usize = 50;

/// Outcome of a validation pass. Errors block execution; warnings do not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors joined into one line for error payloads.
    pub fn detail(&self) -> String {
        self.errors.join("; ")
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Schema validation: turn a raw JSON document into a typed definition, or
/// report what is structurally wrong with it.
pub fn parse_document(document: &Value) -> Result<WorkflowDefinition, ValidationReport> {
    let mut report = ValidationReport::default();

    let Some(root) = document.as_object() else {
        report.error("workflow document must be a JSON object");
        return Err(report);
    };

    match root.get("id") {
        Some(Value::String(id)) if !id.is_empty() => {}
        Some(Value::String(_)) => report.error("workflow `id` must be a non-empty string"),
        Some(_) => report.error("workflow `id` must be a string"),
        None => report.error("workflow is missing `id`"),
    }

    match root.get("steps") {
        Some(Value::Array(steps)) if !steps.is_empty() => {
            for (index, raw) in steps.iter().enumerate() {
                check_step_document(index, raw, &mut report);
            }
        }
        Some(Value::Array(_)) => report.error("workflow `steps` must not be empty"),
        Some(_) => report.error("workflow `steps` must be an array"),
        None => report.error("workflow is missing `steps`"),
    }

    if !report.errors.is_empty() {
        return Err(report);
    }

    match serde_json::from_value::<WorkflowDefinition>(document.clone()) {
        Ok(workflow) => Ok(workflow),
        Err(err) => {
            report.error(format!("workflow document did not deserialize: {err}"));
            Err(report)
        }
    }
}

fn check_step_document(index: usize, raw: &Value, report: &mut ValidationReport) {
    let Some(step) = raw.as_object() else {
        report.error(format!("step #{index} must be a JSON object"));
        return;
    };

    let label = match step.get("id") {
        Some(Value::String(id)) if !id.is_empty() => format!("step `{id}`"),
        _ => {
            report.error(format!("step #{index} is missing a non-empty string `id`"));
            format!("step #{index}")
        }
    };

    if step.contains_key("kind") {
        report.error(format!(
            "{label} uses the field `kind`; the step kind is stored as `type`"
        ));
    }

    let kind = match step.get("type") {
        Some(Value::String(kind)) => match kind.as_str() {
            "agent" | "transform" | "condition" => Some(kind.as_str()),
            other => {
                report.error(format!(
                    "{label} has unknown type `{other}` (expected agent, transform, or condition)"
                ));
                None
            }
        },
        Some(_) => {
            report.error(format!("{label} `type` must be a string"));
            None
        }
        None => {
            report.error(format!("{label} is missing `type`"));
            None
        }
    };

    let has_string = |field: &str| matches!(step.get(field), Some(Value::String(s)) if !s.is_empty());
    match kind {
        Some("agent") if !has_string("agent") => {
            report.error(format!("{label} is an agent step but has no `agent` name"));
        }
        Some("transform") if !has_string("transform") => {
            report.error(format!(
                "{label} is a transform step but has no `transform` expression"
            ));
        }
        Some("condition") => {
            if !has_string("condition") {
                report.error(format!(
                    "{label} is a condition step but has no `condition` expression"
                ));
            }
            if !has_string("then") {
                report.error(format!("{label} is a condition step but has no `then` branch"));
            }
        }
        _ => {}
    }
}

/// Semantic validation over a typed definition.
pub fn validate(workflow: &WorkflowDefinition) -> ValidationReport {
    let mut report = ValidationReport::default();

    if workflow.id.is_empty() {
        report.error("workflow `id` must be a non-empty string");
    }
    if workflow.steps.is_empty() {
        report.error(format!("workflow `{}` has no steps", workflow.id));
        return report;
    }

    let mut seen = HashSet::new();
    for step in &workflow.steps {
        if !seen.insert(step.id.as_str()) {
            report.error(format!("duplicate step id `{}`", step.id));
        }
    }

    for step in &workflow.steps {
        check_required_fields(step, &mut report);
        check_routing(workflow, step, &mut report);
        check_expressions(step, &mut report);
        if step.timeout_ms == Some(0) {
            report.error(format!("step `{}` has a zero `timeout_ms`", step.id));
        }
    }

    if workflow.max_iterations == Some(0) {
        report.error(format!("workflow `{}` has a zero `max_iterations`", workflow.id));
    }
    if workflow.max_duration_ms == Some(0) {
        report.error(format!("workflow `{}` has a zero `max_duration_ms`", workflow.id));
    }

    for step_id in unreachable_steps(workflow) {
        report.warn(format!("step `{step_id}` is unreachable from the entry step"));
    }
    for step in &workflow.steps {
        if step.kind == StepKind::Agent && step.on_error.is_none() {
            report.warn(format!(
                "agent step `{}` has no `on_error` handler; a failure aborts the workflow",
                step.id
            ));
        }
    }
    if workflow.steps.len() > LARGE_WORKFLOW_STEPS {
        report.warn(format!(
            "workflow `{}` declares {} steps (more than {LARGE_WORKFLOW_STEPS}); consider splitting it",
            workflow.id,
            workflow.steps.len()
        ));
    }

    report
}

fn check_required_fields(step: &WorkflowStep, report: &mut ValidationReport) {
    match step.kind {
        StepKind::Agent => {
            if step.agent.as_deref().unwrap_or("").is_empty() {
                report.error(format!("agent step `{}` has no `agent` name", step.id));
            }
        }
        StepKind::Transform => {
            if step.transform.as_deref().unwrap_or("").is_empty() {
                report.error(format!(
                    "transform step `{}` has no `transform` expression",
                    step.id
                ));
            }
        }
        StepKind::Condition => {
            if step.condition.as_deref().unwrap_or("").is_empty() {
                report.error(format!(
                    "condition step `{}` has no `condition` expression",
                    step.id
                ));
            }
            if step.then_branch.as_deref().unwrap_or("").is_empty() {
                report.error(format!("condition step `{}` has no `then` branch", step.id));
            }
        }
    }
}

fn check_routing(workflow: &WorkflowDefinition, step: &WorkflowStep, report: &mut ValidationReport) {
    let references = [
        ("next", step.next.step_id()),
        ("then", step.then_branch.as_deref()),
        ("else", step.else_branch.as_deref()),
        ("on_error", step.on_error.as_deref()),
        ("input", step.input.as_deref()),
    ];
    for (field, target) in references {
        if let Some(target) = target {
            if workflow.step(target).is_none() {
                report.error(format!(
                    "step `{}` {field} references non-existent step `{target}`",
                    step.id
                ));
            }
        }
    }
    if step.input.as_deref() == Some(step.id.as_str()) {
        report.error(format!("step `{}` cannot take its own result as input", step.id));
    }
}

fn check_expressions(step: &WorkflowStep, report: &mut ValidationReport) {
    for (field, expression) in [("transform", &step.transform), ("condition", &step.condition)] {
        if let Some(expression) = expression {
            if let Some(name) = contains_forbidden_name(expression) {
                report.error(format!(
                    "step `{}` {field} expression contains forbidden name `{name}`",
                    step.id
                ));
            }
        }
    }
}

/// Steps with no inbound routing path from the entry step, in declaration
/// order.
fn unreachable_steps(workflow: &WorkflowDefinition) -> Vec<String> {
    let Some(entry) = workflow.entry() else {
        return Vec::new();
    };

    let mut reachable: HashSet<&str> = HashSet::new();
    let mut queue = VecDeque::from([entry.id.as_str()]);
    while let Some(id) = queue.pop_front() {
        if !reachable.insert(id) {
            continue;
        }
        let Some(step) = workflow.step(id) else {
            continue;
        };

        fn push<'a>(queue: &mut VecDeque<&'a str>, reachable: &HashSet<&'a str>, target: Option<&'a str>) {
            if let Some(target) = target {
                if !reachable.contains(target) {
                    queue.push_back(target);
                }
            }
        }

        match step.kind {
            StepKind::Condition => {
                push(&mut queue, &reachable, step.then_branch.as_deref());
                push(&mut queue, &reachable, step.else_branch.as_deref());
            }
            _ => match &step.next {
                NextPointer::Step(next) => push(&mut queue, &reachable, Some(next)),
                NextPointer::End => {}
                NextPointer::Unset => push(&mut queue, &reachable, workflow.declared_successor(id)),
            },
        }
        push(&mut queue, &reachable, step.on_error.as_deref());
    }

    workflow
        .steps
        .iter()
        .filter(|step| !reachable.contains(step.id.as_str()))
        .map(|step| step.id.clone())
        .collect()
}
