//! UI adapter trait — progress surface for workflow runs.

use serde_json::Value;
use tracing::{error, info};

/// Host UI channel notified at workflow and step transitions.
///
/// Every method is fire-and-forget from the engine's perspective:
/// implementations must return promptly and swallow their own failures —
/// a broken toast must never fail a workflow.
pub trait UiAdapter: Send + Sync {
    fn workflow_start(&self, workflow_id: &str);
    fn workflow_complete(&self, workflow_id: &str, duration_ms: u64);
    fn workflow_error(&self, workflow_id: &str, error: &str);
    fn step_start(&self, step_id: &str);
    fn step_progress(&self, step_id: &str, iteration: u32, total_steps: usize);
    fn step_complete(&self, step_id: &str, duration_ms: u64);
    fn step_error(&self, step_id: &str, error: &str);

    /// Ask the user to approve something. Headless adapters approve by default.
    fn approval_prompt(&self, message: &str, context: &Value, timeout_ms: Option<u64>) -> bool {
        let _ = (message, context, timeout_ms);
        true
    }
}

/// Default no-op UI.
pub struct NoopUi;

impl UiAdapter for NoopUi {
    fn workflow_start(&self, _: &str) {}
    fn workflow_complete(&self, _: &str, _: u64) {}
    fn workflow_error(&self, _: &str, _: &str) {}
    fn step_start(&self, _: &str) {}
    fn step_progress(&self, _: &str, _: u32, _: usize) {}
    fn step_complete(&self, _: &str, _: u64) {}
    fn step_error(&self, _: &str, _: &str) {}
}

/// UI that narrates progress through `tracing` — useful when the host has no
/// visual channel wired up.
pub struct TracingUi;

impl UiAdapter for TracingUi {
    fn workflow_start(&self, workflow_id: &str) {
        info!("🔄 Workflow '{}' started", workflow_id);
    }

    fn workflow_complete(&self, workflow_id: &str, duration_ms: u64) {
        info!("🏁 Workflow '{}' completed in {}ms", workflow_id, duration_ms);
    }

    fn workflow_error(&self, workflow_id: &str, error: &str) {
        error!("❌ Workflow '{}' failed: {}", workflow_id, error);
    }

    fn step_start(&self, step_id: &str) {
        info!("→ Step '{}' started", step_id);
    }

    fn step_progress(&self, step_id: &str, iteration: u32, total_steps: usize) {
        info!("→ Step '{}' (iteration {}, {} steps declared)", step_id, iteration, total_steps);
    }

    fn step_complete(&self, step_id: &str, duration_ms: u64) {
        info!("  ✅ Step '{}' completed ({}ms)", step_id, duration_ms);
    }

    fn step_error(&self, step_id: &str, error: &str) {
        error!("  ❌ Step '{}' failed: {}", step_id, error);
    }
}
