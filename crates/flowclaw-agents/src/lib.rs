//! # FlowClaw Agents
//!
//! Agent name resolution and the session adapter that runs one agent turn
//! against the host: create → prompt → poll → collect → delete. Sessions
//! never leak through this crate's public surface.

pub mod adapter;
pub mod registry;

pub use adapter::SessionAgentExecutor;
pub use registry::AgentRegistry;
