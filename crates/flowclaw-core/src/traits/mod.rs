//! Collaborator traits — every external seam is a trait so the engine can run
//! against in-memory stand-ins.

pub mod executor;
pub mod session;
pub mod ui;

pub use executor::AgentExecutor;
pub use session::SessionClient;
pub use ui::{NoopUi, TracingUi, UiAdapter};
