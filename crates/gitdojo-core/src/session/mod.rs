//! Session State Machine and the manager that addresses sessions by id.

pub mod manager;
#[allow(clippy::module_inception)]
pub mod session;
pub mod state;

pub use manager::SessionManager;
pub use session::{
    HelpKind, HelpResponse, Session, SessionSummary, StageRuntime, StageView, SubmitResponse,
};
pub use state::SessionState;
