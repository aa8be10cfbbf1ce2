//! Host session API trait — the transport the agent adapter talks through.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;
use crate::types::{SessionMessage, SessionStatus};

/// Narrow contract over the host's session lifecycle.
///
/// Each session id is exclusively owned by the step attempt that created it;
/// no two operations run concurrently against the same id. The agent name is
/// never passed at create time — it travels with the prompt.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Open a session and return its id.
    async fn create(&self, title: &str) -> Result<String>;

    /// Start an agent turn. Returns once the host has accepted the prompt,
    /// not once the turn finishes.
    async fn prompt(&self, session_id: &str, agent: &str, text: &str) -> Result<()>;

    /// Snapshot of every live session's state.
    async fn status(&self) -> Result<HashMap<String, SessionStatus>>;

    /// Ordered transcript of a session.
    async fn messages(&self, session_id: &str) -> Result<Vec<SessionMessage>>;

    /// Release a session.
    async fn delete(&self, session_id: &str) -> Result<()>;
}
