//! Workflow engine — validates, traverses the step graph, dispatches to
//! executors, applies guards, and notifies the UI channel.
//!
//! The engine carries no mutable per-run state: `execute` borrows `&self`,
//! so one engine instance can drive any number of concurrent runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{error, info, warn};

use flowclaw_core::{AgentExecutor, EngineConfig, FlowClawError, NoopUi, UiAdapter};

use crate::context::Context;
use crate::executors::{
    AgentStepExecutor, BaseExecutor, ConditionStepExecutor, StepExecutor, StepRoute,
    TransformStepExecutor,
};
use crate::guards::{CircularDependencyGuard, Guard, MaxErrorGuard};
use crate::model::{NextPointer, StepKind, WorkflowDefinition};
use crate::validate::validate;

/// Outcome of one workflow run.
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub workflow_id: String,
    pub ok: bool,
    pub final_context: Context,
    /// Human-readable failure reason, when `ok` is false.
    pub reason: Option<String>,
    pub error: Option<FlowClawError>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl WorkflowResult {
    fn success(
        workflow_id: &str,
        final_context: Context,
        duration_ms: u64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            ok: true,
            final_context,
            reason: None,
            error: None,
            duration_ms,
            started_at,
            completed_at: Utc::now(),
        }
    }

    fn failure(
        workflow_id: &str,
        final_context: Context,
        error: FlowClawError,
        duration_ms: u64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            ok: false,
            final_context,
            reason: Some(error.to_string()),
            error: Some(error),
            duration_ms,
            started_at,
            completed_at: Utc::now(),
        }
    }

    /// Summary line for display.
    pub fn summary(&self) -> String {
        format!(
            "Workflow '{}' — {} | Steps: {} | Errors: {} | Time: {:.1}s",
            self.workflow_id,
            if self.ok { "✅ Completed" } else { "❌ Failed" },
            self.final_context.metadata().previous_steps.len(),
            self.final_context.error_count(),
            self.duration_ms as f64 / 1000.0,
        )
    }
}

/// The top-level orchestrator.
pub struct WorkflowEngine {
    executors: HashMap<StepKind, Arc<dyn StepExecutor>>,
    guards: Vec<Arc<dyn Guard>>,
    ui: Arc<dyn UiAdapter>,
    config: EngineConfig,
}

impl WorkflowEngine {
    /// Engine with the three standard executors wired to the given agent
    /// backend, a no-op UI, and no guards.
    pub fn new(agents: Arc<dyn AgentExecutor>) -> Self {
        let mut executors: HashMap<StepKind, Arc<dyn StepExecutor>> = HashMap::new();
        executors.insert(
            StepKind::Agent,
            Arc::new(AgentStepExecutor::new(agents)) as Arc<dyn StepExecutor>,
        );
        executors.insert(StepKind::Transform, Arc::new(TransformStepExecutor));
        executors.insert(StepKind::Condition, Arc::new(ConditionStepExecutor));
        Self {
            executors,
            guards: Vec::new(),
            ui: Arc::new(NoopUi),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_ui(mut self, ui: Arc<dyn UiAdapter>) -> Self {
        self.ui = ui;
        self
    }

    pub fn with_guard(mut self, guard: Arc<dyn Guard>) -> Self {
        self.guards.push(guard);
        self
    }

    /// Install the built-in guard pair with default thresholds.
    pub fn with_default_guards(self) -> Self {
        self.with_guard(Arc::new(MaxErrorGuard::default()))
            .with_guard(Arc::new(CircularDependencyGuard::default()))
    }

    /// Replace the executor for one step kind (testing and host extension).
    pub fn with_executor(mut self, executor: Arc<dyn StepExecutor>) -> Self {
        self.executors.insert(executor.kind(), executor);
        self
    }

    /// Run a workflow to a terminal state.
    pub async fn execute(&self, workflow: &WorkflowDefinition, input: Value) -> WorkflowResult {
        let started = Instant::now();
        let started_at = Utc::now();
        let entry = workflow
            .entry()
            .map(|step| step.id.clone())
            .unwrap_or_default();

        // Validation comes first; an invalid workflow never reaches the UI,
        // an executor, or a session.
        let report = validate(workflow);
        if !report.is_valid() {
            return WorkflowResult::failure(
                &workflow.id,
                Context::new(input, &entry),
                FlowClawError::validation(&workflow.id, report.detail()),
                started.elapsed().as_millis() as u64,
                started_at,
            );
        }
        for warning in &report.warnings {
            warn!("workflow '{}': {}", workflow.id, warning);
        }

        let mut context = Context::new(input, &entry);
        let max_iterations = workflow
            .max_iterations
            .unwrap_or(self.config.default_max_iterations);
        let max_duration = Duration::from_millis(
            workflow
                .max_duration_ms
                .unwrap_or(self.config.default_max_duration_ms),
        );
        let base = BaseExecutor::new(self.config.clone());
        let total_steps = workflow.step_count();

        self.ui.workflow_start(&workflow.id);
        info!(
            "🔄 Starting workflow '{}' with {} steps",
            workflow.id, total_steps
        );

        let failure: FlowClawError = loop {
            let iteration = context.metadata().iteration_count;
            if iteration >= max_iterations {
                let visited = &context.metadata().previous_steps;
                let recent = visited[visited.len().saturating_sub(5)..].join(", ");
                break FlowClawError::IterationBound {
                    max_iterations,
                    recent,
                };
            }
            if started.elapsed() >= max_duration {
                break FlowClawError::DurationBound {
                    max_duration_ms: max_duration.as_millis() as u64,
                    steps_completed: context.metadata().previous_steps.len(),
                    last_step: context.metadata().current_step.clone(),
                };
            }
            if let Some(err) = self
                .guards
                .iter()
                .find_map(|guard| guard.check(&context, workflow).err())
            {
                break err;
            }

            let step_id = context.metadata().current_step.clone();
            let Some(step) = workflow.step(&step_id) else {
                break FlowClawError::Reference {
                    step_id: context
                        .metadata()
                        .previous_steps
                        .last()
                        .cloned()
                        .unwrap_or_else(|| "entry".to_string()),
                    target: step_id,
                };
            };
            let Some(executor) = self.executors.get(&step.kind) else {
                let mut known: Vec<String> =
                    self.executors.keys().map(ToString::to_string).collect();
                known.sort_unstable();
                break FlowClawError::ExecutorMissing {
                    kind: step.kind.to_string(),
                    known: known.join(", "),
                };
            };

            self.ui.step_start(&step_id);
            self.ui.step_progress(&step_id, iteration, total_steps);

            let result = base.execute(executor.as_ref(), step, &context).await;
            match result.outcome {
                Ok(execution) => {
                    self.ui.step_complete(&step_id, result.duration_ms);
                    info!(
                        "  ✅ Step '{}' completed ({} attempt(s), {}ms)",
                        step_id, result.attempts, result.duration_ms
                    );

                    let next = match execution.route {
                        StepRoute::Goto(target) => Some(target),
                        StepRoute::Terminal => None,
                        StepRoute::Follow => match &step.next {
                            NextPointer::Step(next) => Some(next.clone()),
                            NextPointer::End => None,
                            NextPointer::Unset => {
                                workflow.declared_successor(&step_id).map(str::to_string)
                            }
                        },
                    };

                    context = context.add_result(&step_id, execution.value);
                    match next {
                        Some(next_id) => context = context.advance(Some(&next_id)),
                        None => {
                            context = context.advance(None);
                            let duration_ms = started.elapsed().as_millis() as u64;
                            self.ui.workflow_complete(&workflow.id, duration_ms);
                            info!(
                                "🏁 Workflow '{}' completed — {} steps, {:.1}s",
                                workflow.id,
                                context.metadata().previous_steps.len(),
                                duration_ms as f64 / 1000.0
                            );
                            return WorkflowResult::success(
                                &workflow.id,
                                context,
                                duration_ms,
                                started_at,
                            );
                        }
                    }
                }
                Err(err) => {
                    self.ui.step_error(&step_id, &err.to_string());
                    if let Some(handler) = &step.on_error {
                        warn!(
                            "  ⚠ Step '{}' failed after {} attempt(s), routing to '{}': {}",
                            step_id, result.attempts, handler, err
                        );
                        context = context.record_error(&step_id, &err).advance(Some(handler));
                    } else {
                        error!(
                            "  ❌ Step '{}' failed after {} attempt(s): {}",
                            step_id, result.attempts, err
                        );
                        context = context.record_error(&step_id, &err).advance(None);
                        break err;
                    }
                }
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        self.ui.workflow_error(&workflow.id, &failure.to_string());
        error!("❌ Workflow '{}' failed: {}", workflow.id, failure);
        WorkflowResult::failure(&workflow.id, context, failure, duration_ms, started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkflowStep as Step;
    use async_trait::async_trait;
    use flowclaw_core::AgentInput;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    enum Turn {
        Reply(Value),
        SlowReply(u64, Value),
        Fail(FlowClawError),
        SleepUntilDeadline,
    }

    /// Scripted agent backend: per-agent queues of turns, recorded calls.
    #[derive(Default)]
    struct StubAgents {
        scripts: Mutex<HashMap<String, VecDeque<Turn>>>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl StubAgents {
        fn script(self, agent: &str, turns: Vec<Turn>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .entry(agent.to_string())
                .or_default()
                .extend(turns);
            self
        }

        fn reply(self, agent: &str, value: Value) -> Self {
            self.script(agent, vec![Turn::Reply(value)])
        }

        fn calls_for(&self, agent: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(name, _)| name == agent)
                .count()
        }

        fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn envelope(&self, index: usize) -> Value {
            self.calls.lock().unwrap()[index].1.clone()
        }
    }

    #[async_trait]
    impl AgentExecutor for StubAgents {
        async fn execute(
            &self,
            agent_name: &str,
            input: &AgentInput,
            deadline: Instant,
        ) -> flowclaw_core::Result<Value> {
            self.calls
                .lock()
                .unwrap()
                .push((agent_name.to_string(), input.to_value()));
            let turn = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(agent_name)
                .and_then(VecDeque::pop_front);
            match turn {
                Some(Turn::Reply(value)) => Ok(value),
                Some(Turn::SlowReply(delay_ms, value)) => {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    Ok(value)
                }
                Some(Turn::Fail(err)) => Err(err),
                Some(Turn::SleepUntilDeadline) => {
                    tokio::time::sleep_until(deadline).await;
                    Err(FlowClawError::Timeout {
                        limit_ms: 0,
                        elapsed_ms: 0,
                        context: "stub hit attempt deadline".to_string(),
                    })
                }
                None => Err(FlowClawError::session(
                    "prompt",
                    format!("no scripted reply for `{agent_name}`"),
                )),
            }
        }
    }

    /// UI that records every notification in order.
    #[derive(Default)]
    struct RecordingUi {
        events: Mutex<Vec<String>>,
    }

    impl RecordingUi {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl UiAdapter for RecordingUi {
        fn workflow_start(&self, id: &str) {
            self.events.lock().unwrap().push(format!("workflow_start:{id}"));
        }
        fn workflow_complete(&self, id: &str, _duration_ms: u64) {
            self.events
                .lock()
                .unwrap()
                .push(format!("workflow_complete:{id}"));
        }
        fn workflow_error(&self, id: &str, _error: &str) {
            self.events.lock().unwrap().push(format!("workflow_error:{id}"));
        }
        fn step_start(&self, id: &str) {
            self.events.lock().unwrap().push(format!("step_start:{id}"));
        }
        fn step_progress(&self, _id: &str, _iteration: u32, _total: usize) {}
        fn step_complete(&self, id: &str, _duration_ms: u64) {
            self.events.lock().unwrap().push(format!("step_complete:{id}"));
        }
        fn step_error(&self, id: &str, _error: &str) {
            self.events.lock().unwrap().push(format!("step_error:{id}"));
        }
    }

    fn engine(agents: Arc<StubAgents>) -> WorkflowEngine {
        WorkflowEngine::new(agents)
    }

    fn session_error() -> FlowClawError {
        FlowClawError::session("create", "host busy")
    }

    #[tokio::test]
    async fn test_scenario_single_agent_step() {
        let agents = Arc::new(StubAgents::default().reply("plan", json!({"ok": true, "summary": "hi"})));
        let workflow =
            WorkflowDefinition::new("s").add_step(Step::agent("plan", "plan"));

        let result = engine(agents.clone())
            .execute(&workflow, json!({"task": "Hi"}))
            .await;

        assert!(result.ok, "run failed: {:?}", result.reason);
        let context = &result.final_context;
        assert_eq!(context.get_by_path("plan.summary"), Some(&json!("hi")));
        assert_eq!(context.metadata().previous_steps, vec!["plan"]);
        assert_eq!(context.metadata().iteration_count, 1);
        assert_eq!(agents.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_scenario_sequential_pipeline() {
        let agents = Arc::new(
            StubAgents::default()
                .reply("plan", json!({"files": ["a.ts"]}))
                .reply("build", json!({"built": true, "bytes": 42}))
                .reply("test", json!({"passed": true})),
        );
        let workflow = WorkflowDefinition::new("pipeline")
            .add_step(Step::agent("plan", "plan"))
            .add_step(Step::agent("build", "build").with_input("plan"))
            .add_step(Step::agent("test", "test").with_input("build"));

        let result = engine(agents.clone()).execute(&workflow, json!("ship it")).await;

        assert!(result.ok);
        let context = &result.final_context;
        assert_eq!(context.get_by_path("test.passed"), Some(&json!(true)));
        assert_eq!(
            context.metadata().previous_steps,
            vec!["plan", "build", "test"]
        );
        assert!(context.has_result("plan") && context.has_result("build"));

        // The build step's primary input was the plan result.
        let build_envelope = agents.envelope(1);
        assert_eq!(build_envelope["input"], json!({"files": ["a.ts"]}));
        assert_eq!(build_envelope["context"]["plan"], json!({"files": ["a.ts"]}));
    }

    #[tokio::test]
    async fn test_scenario_transform_chain() {
        let agents =
            Arc::new(StubAgents::default().reply("plan", json!({"files": ["a.ts", "b.ts"]})));
        let workflow = WorkflowDefinition::new("chain")
            .add_step(Step::agent("plan", "plan"))
            .add_step(Step::transform("sum", "plan.files.length + 1"));

        let result = engine(agents).execute(&workflow, json!(null)).await;

        assert!(result.ok);
        assert_eq!(result.final_context.get_result("sum"), Some(&json!(3)));
    }

    #[tokio::test]
    async fn test_scenario_conditional_branch() {
        let agents = Arc::new(
            StubAgents::default()
                .reply("test", json!({"passed": true}))
                .reply("success", json!({"celebrated": true}))
                .reply("retry", json!({"should_not_run": true})),
        );
        let workflow = WorkflowDefinition::new("gated")
            .add_step(Step::agent("test", "test"))
            .add_step(
                Step::condition("gate", "test.passed === true", "success").with_else("retry"),
            )
            .add_step(Step::agent("success", "success").with_end())
            .add_step(Step::agent("retry", "retry"));

        let result = engine(agents.clone()).execute(&workflow, json!(null)).await;

        assert!(result.ok);
        let context = &result.final_context;
        assert_eq!(
            context.metadata().previous_steps,
            vec!["test", "gate", "success"]
        );
        assert_eq!(context.get_result("gate"), Some(&json!(true)));
        assert_eq!(agents.calls_for("retry"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_retry_with_eventual_success() {
        let agents = Arc::new(StubAgents::default().script(
            "flaky",
            vec![
                Turn::Fail(session_error()),
                Turn::Fail(session_error()),
                Turn::Reply(json!({"ok": true})),
            ],
        ));
        let workflow = WorkflowDefinition::new("retrying")
            .add_step(Step::agent("flaky", "flaky").with_retries(3));

        let result = engine(agents.clone()).execute(&workflow, json!(null)).await;

        assert!(result.ok);
        assert_eq!(agents.calls_for("flaky"), 3);
        assert_eq!(result.final_context.error_count(), 0);
    }

    #[tokio::test]
    async fn test_scenario_expression_safety() {
        let agents = Arc::new(StubAgents::default().reply("plan", json!({})));
        let ui = Arc::new(RecordingUi::default());
        let workflow = WorkflowDefinition::new("unsafe")
            .add_step(Step::agent("plan", "plan").with_on_error("plan"))
            .add_step(Step::transform("t", "__proto__.polluted"));

        let result = engine(agents.clone())
            .with_ui(ui.clone())
            .execute(&workflow, json!(null))
            .await;

        assert!(!result.ok);
        assert!(matches!(result.error, Some(FlowClawError::Validation { .. })));
        // Nothing ran and nothing was notified.
        assert_eq!(agents.total_calls(), 0);
        assert!(ui.events().is_empty());
    }

    fn linear_transforms(count: usize) -> WorkflowDefinition {
        let mut workflow = WorkflowDefinition::new("linear");
        for index in 0..count {
            workflow = workflow.add_step(Step::transform(&format!("t{index}"), "input"));
        }
        workflow
    }

    #[tokio::test]
    async fn test_exactly_max_iterations_succeeds() {
        let agents = Arc::new(StubAgents::default());
        let workflow = linear_transforms(3).with_max_iterations(3);

        let result = engine(agents).execute(&workflow, json!(1)).await;

        assert!(result.ok);
        assert_eq!(result.final_context.metadata().iteration_count, 3);
        assert_eq!(result.final_context.metadata().previous_steps.len(), 3);
    }

    #[tokio::test]
    async fn test_one_step_past_max_iterations_aborts() {
        let agents = Arc::new(StubAgents::default());
        let workflow = linear_transforms(4).with_max_iterations(3);

        let result = engine(agents).execute(&workflow, json!(1)).await;

        assert!(!result.ok);
        match result.error {
            Some(FlowClawError::IterationBound {
                max_iterations,
                ref recent,
            }) => {
                assert_eq!(max_iterations, 3);
                assert!(recent.contains("t2"));
            }
            ref other => panic!("expected iteration bound, got {other:?}"),
        }
        // The bound tripped before the fourth step ran.
        assert_eq!(result.final_context.metadata().previous_steps.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_workflow_duration_bound() {
        let agents = Arc::new(
            StubAgents::default()
                .script("slow", vec![Turn::SlowReply(10_000, json!({"ok": true}))])
                .reply("after", json!({})),
        );
        let workflow = WorkflowDefinition::new("slow")
            .with_max_duration_ms(5_000)
            .add_step(Step::agent("first", "slow"))
            .add_step(Step::agent("second", "after"));

        let result = engine(agents.clone()).execute(&workflow, json!(null)).await;

        assert!(!result.ok);
        match result.error {
            Some(FlowClawError::DurationBound {
                steps_completed, ..
            }) => assert_eq!(steps_completed, 1),
            ref other => panic!("expected duration bound, got {other:?}"),
        }
        // The first step finished; the second never started.
        assert_eq!(agents.calls_for("after"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_timeout_routes_to_on_error() {
        let agents = Arc::new(
            StubAgents::default().script("stuck", vec![Turn::SleepUntilDeadline]),
        );
        let workflow = WorkflowDefinition::new("timeouts")
            .add_step(
                Step::agent("work", "stuck")
                    .with_timeout_ms(1_000)
                    .with_on_error("fallback"),
            )
            .add_step(Step::transform("fallback", "'gave up'"));

        let result = engine(agents).execute(&workflow, json!(null)).await;

        assert!(result.ok);
        let context = &result.final_context;
        assert_eq!(context.get_result("fallback"), Some(&json!("gave up")));
        assert_eq!(context.error_count(), 1);
        assert_eq!(context.error_steps(), vec!["work"]);
        assert_eq!(context.metadata().previous_steps, vec!["work", "fallback"]);
    }

    #[tokio::test]
    async fn test_failure_without_handler_aborts() {
        let agents = Arc::new(
            StubAgents::default().script("plan", vec![Turn::Fail(session_error())]),
        );
        let workflow =
            WorkflowDefinition::new("fragile").add_step(Step::agent("plan", "plan"));

        let result = engine(agents).execute(&workflow, json!(null)).await;

        assert!(!result.ok);
        assert!(matches!(result.error, Some(FlowClawError::Session { .. })));
        // Partial context is returned with the failure recorded.
        assert_eq!(result.final_context.error_steps(), vec!["plan"]);
        assert!(!result.final_context.has_result("plan"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_error_guard_stops_error_loop() {
        let agents = Arc::new(StubAgents::default().script(
            "doomed",
            vec![
                Turn::Fail(session_error()),
                Turn::Fail(session_error()),
                Turn::Fail(session_error()),
            ],
        ));
        // The step recovers onto itself, forever.
        let workflow = WorkflowDefinition::new("loop")
            .add_step(Step::agent("work", "doomed").with_on_error("work"));

        let result = engine(agents)
            .with_guard(Arc::new(MaxErrorGuard::new(3)))
            .execute(&workflow, json!(null))
            .await;

        assert!(!result.ok);
        match result.error {
            Some(FlowClawError::Guard { ref guard, .. }) => assert_eq!(guard, "max-errors"),
            ref other => panic!("expected guard error, got {other:?}"),
        }
        assert_eq!(result.final_context.error_count(), 3);
    }

    #[tokio::test]
    async fn test_circular_guard_stops_tight_cycle() {
        let agents = Arc::new(StubAgents::default());
        let workflow = WorkflowDefinition::new("cycle")
            .add_step(Step::transform("a", "input").with_next("b"))
            .add_step(Step::transform("b", "input").with_next("a"));

        let result = engine(agents)
            .with_guard(Arc::new(CircularDependencyGuard::new(3)))
            .execute(&workflow, json!(null))
            .await;

        assert!(!result.ok);
        match result.error {
            Some(FlowClawError::Guard { ref guard, ref reason }) => {
                assert_eq!(guard, "circular-dependency");
                assert!(reason.contains("visited 4 times"));
            }
            ref other => panic!("expected guard error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validation_failure_reports_details() {
        let agents = Arc::new(StubAgents::default());
        let workflow = WorkflowDefinition::new("broken")
            .add_step(Step::transform("a", "input").with_next("ghost"));

        let result = engine(agents).execute(&workflow, json!(null)).await;

        assert!(!result.ok);
        match result.error {
            Some(FlowClawError::Validation { ref details, .. }) => {
                assert!(details.contains("ghost"));
            }
            ref other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ui_event_ordering() {
        let agents = Arc::new(StubAgents::default().reply("plan", json!({})));
        let ui = Arc::new(RecordingUi::default());
        let workflow = WorkflowDefinition::new("s").add_step(Step::agent("plan", "plan"));

        engine(agents).with_ui(ui.clone()).execute(&workflow, json!(null)).await;

        assert_eq!(
            ui.events(),
            vec![
                "workflow_start:s",
                "step_start:plan",
                "step_complete:plan",
                "workflow_complete:s",
            ]
        );
    }

    #[tokio::test]
    async fn test_ui_sees_step_and_workflow_errors() {
        let agents =
            Arc::new(StubAgents::default().script("plan", vec![Turn::Fail(session_error())]));
        let ui = Arc::new(RecordingUi::default());
        let workflow = WorkflowDefinition::new("s").add_step(Step::agent("plan", "plan"));

        engine(agents).with_ui(ui.clone()).execute(&workflow, json!(null)).await;

        assert_eq!(
            ui.events(),
            vec![
                "workflow_start:s",
                "step_start:plan",
                "step_error:plan",
                "workflow_error:s",
            ]
        );
    }

    #[tokio::test]
    async fn test_deterministic_runs_produce_equal_results() {
        let workflow = WorkflowDefinition::new("det")
            .add_step(Step::agent("plan", "plan"))
            .add_step(Step::transform("sum", "plan.files.length * 10"));

        let mut snapshots = Vec::new();
        for _ in 0..2 {
            let agents =
                Arc::new(StubAgents::default().reply("plan", json!({"files": ["a", "b"]})));
            let result = engine(agents).execute(&workflow, json!({"task": "x"})).await;
            assert!(result.ok);
            snapshots.push(result.final_context.results_map());
        }
        assert_eq!(snapshots[0], snapshots[1]);
    }

    /// End-to-end through the real session adapter: engine → agent step →
    /// `SessionAgentExecutor` → in-memory host.
    mod session_integration {
        use super::*;
        use flowclaw_agents::{AgentRegistry, SessionAgentExecutor};
        use flowclaw_core::{
            AgentDefinition, SessionClient, SessionMessage, SessionStatus,
        };

        struct StubHost {
            state: Mutex<HostState>,
        }

        #[derive(Default)]
        struct HostState {
            created: Vec<String>,
            deleted: Vec<String>,
            next_id: u32,
            /// Turns that end in a session error before one succeeds.
            failing_turns: u32,
            reply: String,
        }

        impl StubHost {
            fn new(reply: &str) -> Self {
                Self {
                    state: Mutex::new(HostState {
                        reply: reply.to_string(),
                        ..HostState::default()
                    }),
                }
            }

            fn with_failing_turns(self, count: u32) -> Self {
                self.state.lock().unwrap().failing_turns = count;
                self
            }

            fn created(&self) -> usize {
                self.state.lock().unwrap().created.len()
            }

            fn deleted(&self) -> usize {
                self.state.lock().unwrap().deleted.len()
            }
        }

        #[async_trait]
        impl SessionClient for StubHost {
            async fn create(&self, _title: &str) -> flowclaw_core::Result<String> {
                let mut state = self.state.lock().unwrap();
                state.next_id += 1;
                let id = format!("ses_{}", state.next_id);
                state.created.push(id.clone());
                Ok(id)
            }

            async fn prompt(
                &self,
                _session_id: &str,
                _agent: &str,
                _text: &str,
            ) -> flowclaw_core::Result<()> {
                Ok(())
            }

            async fn status(
                &self,
            ) -> flowclaw_core::Result<HashMap<String, SessionStatus>> {
                let mut state = self.state.lock().unwrap();
                let failing = state.failing_turns > 0;
                if failing {
                    state.failing_turns -= 1;
                }
                let mut map = HashMap::new();
                for id in &state.created {
                    map.insert(
                        id.clone(),
                        if failing {
                            SessionStatus::error("model overloaded")
                        } else {
                            SessionStatus::idle()
                        },
                    );
                }
                Ok(map)
            }

            async fn messages(
                &self,
                _session_id: &str,
            ) -> flowclaw_core::Result<Vec<SessionMessage>> {
                let state = self.state.lock().unwrap();
                Ok(vec![SessionMessage::assistant(state.reply.clone())])
            }

            async fn delete(&self, session_id: &str) -> flowclaw_core::Result<()> {
                self.state.lock().unwrap().deleted.push(session_id.to_string());
                Ok(())
            }
        }

        fn session_engine(host: Arc<StubHost>) -> WorkflowEngine {
            let registry = AgentRegistry::with_agents(vec![AgentDefinition::new(
                "plan",
                "You plan things.",
            )]);
            WorkflowEngine::new(Arc::new(SessionAgentExecutor::new(
                host,
                Arc::new(registry),
            )))
        }

        #[tokio::test(start_paused = true)]
        async fn test_single_step_uses_exactly_one_session() {
            let host = Arc::new(StubHost::new(r#"{"ok": true, "summary": "hi"}"#));
            let workflow = WorkflowDefinition::new("s").add_step(Step::agent("plan", "plan"));

            let result = session_engine(host.clone())
                .execute(&workflow, json!({"task": "Hi"}))
                .await;

            assert!(result.ok, "run failed: {:?}", result.reason);
            assert_eq!(
                result.final_context.get_by_path("plan.summary"),
                Some(&json!("hi"))
            );
            assert_eq!(host.created(), 1);
            assert_eq!(host.deleted(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_retries_open_fresh_sessions() {
            let host =
                Arc::new(StubHost::new(r#"{"ok": true}"#).with_failing_turns(2));
            let workflow = WorkflowDefinition::new("s")
                .add_step(Step::agent("plan", "plan").with_retries(3));

            let result = session_engine(host.clone())
                .execute(&workflow, json!(null))
                .await;

            assert!(result.ok, "run failed: {:?}", result.reason);
            // Two failed attempts plus the success, one session each,
            // every one released.
            assert_eq!(host.created(), 3);
            assert_eq!(host.deleted(), 3);
        }

        #[tokio::test(start_paused = true)]
        async fn test_unknown_agent_fails_without_sessions() {
            let host = Arc::new(StubHost::new("{}"));
            let workflow = WorkflowDefinition::new("s").add_step(Step::agent("x", "ghost"));

            let result = session_engine(host.clone())
                .execute(&workflow, json!(null))
                .await;

            assert!(!result.ok);
            assert!(matches!(
                result.error,
                Some(FlowClawError::AgentResolution { .. })
            ));
            assert_eq!(host.created(), 0);
        }
    }

    #[tokio::test]
    async fn test_iteration_count_always_matches_previous_steps() {
        // A run mixing successes, a handled failure, and a branch.
        let agents = Arc::new(
            StubAgents::default()
                .script("test", vec![Turn::Fail(session_error())])
                .reply("fix", json!({"passed": false})),
        );
        let workflow = WorkflowDefinition::new("mixed")
            .add_step(Step::agent("test", "test").with_on_error("fix"))
            .add_step(Step::agent("fix", "fix"))
            .add_step(Step::condition("gate", "fix.passed === true", "test"));

        let result = engine(agents).execute(&workflow, json!(null)).await;

        assert!(result.ok);
        let metadata = result.final_context.metadata();
        assert_eq!(
            metadata.iteration_count as usize,
            metadata.previous_steps.len()
        );
        assert_eq!(metadata.previous_steps, vec!["test", "fix", "gate"]);
    }
}
