//! Agent execution trait — the seam between step executors and the session
//! plumbing behind them.

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use crate::error::Result;
use crate::types::AgentInput;

/// Executes one agent turn and returns its result value.
///
/// Implementations own the full session lifecycle internally — a session
/// handle must never escape through this interface. `deadline` is the wall
/// clock instant at which the attempt times out; implementations observe it
/// at every suspension point and tear down their session before returning
/// the timeout error.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(
        &self,
        agent_name: &str,
        input: &AgentInput,
        deadline: Instant,
    ) -> Result<Value>;
}
