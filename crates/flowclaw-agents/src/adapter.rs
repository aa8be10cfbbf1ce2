//! Session adapter — runs one agent turn through the host session API.
//!
//! Protocol per attempt: resolve → create → prompt → poll → collect →
//! delete. The session opened here never escapes; every exit path, including
//! timeout and host errors, releases it with a bounded retry that never
//! masks the primary outcome.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use flowclaw_core::{
    AgentExecutor, AgentInput, EngineConfig, FlowClawError, MessageRole, ResolvedAgent, Result,
    SessionClient, SessionMessage, SessionState,
};

use crate::registry::AgentRegistry;

/// Bridges an agent step to the host's session lifecycle.
pub struct SessionAgentExecutor {
    sessions: Arc<dyn SessionClient>,
    registry: Arc<AgentRegistry>,
    config: EngineConfig,
}

impl SessionAgentExecutor {
    pub fn new(sessions: Arc<dyn SessionClient>, registry: Arc<AgentRegistry>) -> Self {
        Self {
            sessions,
            registry,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Poll `session.status()` until the turn finishes or the budget runs out.
    async fn await_idle(&self, session_id: &str, started: Instant, deadline: Instant) -> Result<()> {
        let interval = Duration::from_millis(self.config.poll_interval_ms);

        for attempt in 1..=self.config.max_poll_attempts {
            let now = Instant::now();
            if now >= deadline {
                return Err(self.deadline_error(session_id, started, deadline));
            }

            let statuses = self.sessions.status().await?;
            match statuses.get(session_id) {
                Some(status) if status.state == SessionState::Idle => return Ok(()),
                Some(status) if status.state == SessionState::Error => {
                    return Err(FlowClawError::session(
                        "turn",
                        status
                            .error
                            .clone()
                            .unwrap_or_else(|| format!("session {session_id} entered error state")),
                    ));
                }
                // Active, or not yet listed by the host — keep polling.
                _ => {}
            }

            debug!(
                "session {} still working (poll {}/{})",
                session_id, attempt, self.config.max_poll_attempts
            );
            let remaining = deadline.saturating_duration_since(Instant::now());
            sleep(interval.min(remaining)).await;
        }

        Err(FlowClawError::Timeout {
            limit_ms: self.config.max_poll_duration_ms(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            context: format!(
                "session {} never went idle in {} polls",
                session_id, self.config.max_poll_attempts
            ),
        })
    }

    fn deadline_error(&self, session_id: &str, started: Instant, deadline: Instant) -> FlowClawError {
        FlowClawError::Timeout {
            limit_ms: deadline.saturating_duration_since(started).as_millis() as u64,
            elapsed_ms: started.elapsed().as_millis() as u64,
            context: format!("agent turn on session {session_id} cancelled at step timeout"),
        }
    }

    async fn run_turn(
        &self,
        session_id: &str,
        resolved: &ResolvedAgent,
        input: &AgentInput,
        started: Instant,
        deadline: Instant,
    ) -> Result<Value> {
        let prompt = render_prompt(resolved, input);
        self.sessions
            .prompt(session_id, &resolved.name, &prompt)
            .await?;

        self.await_idle(session_id, started, deadline).await?;

        let messages = self.sessions.messages(session_id).await?;
        collect_reply(&messages, session_id)
    }

    /// Best-effort release. Never fails the step — a leaked session is a
    /// warning, not an error.
    async fn release(&self, session_id: &str) {
        for attempt in 1..=self.config.session_cleanup_max_retries {
            match self.sessions.delete(session_id).await {
                Ok(()) => {
                    debug!("session {} released", session_id);
                    return;
                }
                Err(err) => {
                    warn!(
                        "⚠ session {} cleanup attempt {}/{} failed: {}",
                        session_id, attempt, self.config.session_cleanup_max_retries, err
                    );
                    if attempt < self.config.session_cleanup_max_retries {
                        sleep(Duration::from_millis(
                            self.config.session_cleanup_retry_delay_ms,
                        ))
                        .await;
                    }
                }
            }
        }
        warn!(
            "⚠ session {} leaked after {} cleanup attempts",
            session_id, self.config.session_cleanup_max_retries
        );
    }
}

#[async_trait]
impl AgentExecutor for SessionAgentExecutor {
    async fn execute(
        &self,
        agent_name: &str,
        input: &AgentInput,
        deadline: Instant,
    ) -> Result<Value> {
        let started = Instant::now();

        // Resolution happens before any session exists — an unknown name
        // must not cost the host a session.
        let resolved = self.registry.resolve(agent_name).ok_or_else(|| {
            FlowClawError::AgentResolution {
                name: agent_name.to_string(),
                available: self.registry.list_names().join(", "),
            }
        })?;

        if started >= deadline {
            return Err(self.deadline_error("(not created)", started, deadline));
        }

        let title = format!("flowclaw: {} ({})", agent_name, short_run_id());
        let session_id = self.sessions.create(&title).await?;
        debug!("session {} opened for agent '{}'", session_id, agent_name);

        let outcome = self
            .run_turn(&session_id, &resolved, input, started, deadline)
            .await;
        self.release(&session_id).await;
        outcome
    }
}

fn short_run_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

/// Build the prompt text for one turn. This is the only place step input is
/// concatenated into a string bound for an agent.
fn render_prompt(resolved: &ResolvedAgent, input: &AgentInput) -> String {
    let mut out = String::new();

    if let Some(definition) = &resolved.definition {
        if !definition.prompt.is_empty() {
            out.push_str(&definition.prompt);
            out.push_str("\n\n");
        }
    }

    match &input.input {
        Value::String(text) => out.push_str(text),
        structured => out.push_str(
            &serde_json::to_string_pretty(structured).unwrap_or_else(|_| structured.to_string()),
        ),
    }

    if !input.context.is_empty() {
        out.push_str("\n\nContext from previous steps:\n");
        for (step_id, value) in &input.context {
            out.push_str(&format!("- {step_id}: {value}\n"));
        }
    }

    out
}

/// Extract the step result from a finished session transcript: the last
/// assistant entry's text parts, parsed as JSON when possible.
fn collect_reply(messages: &[SessionMessage], session_id: &str) -> Result<Value> {
    let reply = messages
        .iter()
        .rev()
        .find(|message| message.info.role == MessageRole::Assistant)
        .ok_or_else(|| {
            FlowClawError::session(
                "messages",
                format!("no assistant reply in session {session_id}"),
            )
        })?;

    let text = reply.joined_text();
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(parsed) => Ok(parsed),
        Err(_) => Ok(json!({ "result": text })),
    }
}
