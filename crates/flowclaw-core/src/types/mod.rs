//! Shared types threaded between the engine, executors, and adapters.

pub mod agent;
pub mod session;

pub use agent::{AgentDefinition, AgentInput, AgentSource, ResolvedAgent};
pub use session::{
    MessageInfo, MessagePart, MessageRole, SessionMessage, SessionState, SessionStatus,
};
