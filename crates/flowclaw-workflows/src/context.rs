//! Immutable per-run state — input, step results, traversal metadata.
//!
//! Every mutating operation returns a fresh `Context`; the one it was called
//! on stays valid and unchanged, so the engine can hold earlier snapshots
//! and reason about them by value.

use serde_json::{json, Map, Value};
use tokio::time::Instant;

use flowclaw_core::FlowClawError;
use flowclaw_expr::lookup_path;

/// Traversal metadata for one run.
#[derive(Debug, Clone)]
pub struct RunMetadata {
    /// Completed engine iterations. Always equals `previous_steps.len()`
    /// once the iteration's bookkeeping has been applied.
    pub iteration_count: u32,
    /// Step the engine will execute next.
    pub current_step: String,
    /// Every visited step id in order — successes and handled failures.
    pub previous_steps: Vec<String>,
    /// When the run began.
    pub started_at: Instant,
    /// Recorded step failures as `(step_id, message)` in occurrence order.
    pub errors: Vec<(String, String)>,
}

/// Immutable execution context threaded through a workflow run.
#[derive(Debug, Clone)]
pub struct Context {
    input: Value,
    results: Vec<(String, Value)>,
    metadata: RunMetadata,
}

impl Context {
    /// Fresh context positioned at the entry step.
    pub fn new(input: Value, entry_step: &str) -> Self {
        Self {
            input,
            results: Vec::new(),
            metadata: RunMetadata {
                iteration_count: 0,
                current_step: entry_step.to_string(),
                previous_steps: Vec::new(),
                started_at: Instant::now(),
                errors: Vec::new(),
            },
        }
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    /// Clone with the step's result stored and the visit recorded.
    pub fn add_result(&self, step_id: &str, value: Value) -> Self {
        let mut next = self.clone();
        next.results.push((step_id.to_string(), value));
        next.metadata.previous_steps.push(step_id.to_string());
        next
    }

    /// Clone with a step failure recorded. The failed visit still lands in
    /// `previous_steps` so loop detection sees error-handler cycles.
    pub fn record_error(&self, step_id: &str, error: &FlowClawError) -> Self {
        let mut next = self.clone();
        next.metadata
            .errors
            .push((step_id.to_string(), error.to_string()));
        next.metadata.previous_steps.push(step_id.to_string());
        next
    }

    /// Clone advanced by one iteration, optionally repositioned at a next
    /// step. `None` leaves `current_step` where it was (terminal bookkeeping).
    pub fn advance(&self, next_step: Option<&str>) -> Self {
        let mut next = self.clone();
        next.metadata.iteration_count += 1;
        if let Some(next_step) = next_step {
            next.metadata.current_step = next_step.to_string();
        }
        next
    }

    /// Latest result recorded under a step id.
    pub fn get_result(&self, step_id: &str) -> Option<&Value> {
        self.results
            .iter()
            .rev()
            .find(|(id, _)| id == step_id)
            .map(|(_, value)| value)
    }

    pub fn has_result(&self, step_id: &str) -> bool {
        self.get_result(step_id).is_some()
    }

    /// Dotted-path reader: `"input.task"` reads into the workflow input,
    /// `"plan.files.0"` into a step result.
    pub fn get_by_path(&self, path: &str) -> Option<&Value> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let root = if head == "input" {
            &self.input
        } else {
            self.get_result(head)?
        };
        match rest {
            Some(rest) => lookup_path(root, rest),
            None => Some(root),
        }
    }

    /// Step results as a map in insertion order; on a revisit the latest
    /// result wins.
    pub fn results_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (id, value) in &self.results {
            map.insert(id.clone(), value.clone());
        }
        map
    }

    pub fn error_count(&self) -> usize {
        self.metadata.errors.len()
    }

    /// Step ids that recorded errors, in occurrence order.
    pub fn error_steps(&self) -> Vec<&str> {
        self.metadata
            .errors
            .iter()
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Diagnostic snapshot for UI payloads and logs.
    pub fn to_value(&self) -> Value {
        json!({
            "input": self.input,
            "results": Value::Object(self.results_map()),
            "metadata": {
                "iteration_count": self.metadata.iteration_count,
                "current_step": self.metadata.current_step,
                "previous_steps": self.metadata.previous_steps,
                "errors": self.metadata.errors.iter().map(|(id, message)| {
                    json!({"step_id": id, "error": message})
                }).collect::<Vec<_>>(),
            },
        })
    }
}
