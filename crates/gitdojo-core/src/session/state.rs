//! Session lifecycle states and the transitions allowed between them.

use serde::{Deserialize, Serialize};

use crate::domain::StageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage_id", rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    StageInProgress(StageId),
    StageCompleted(StageId),
    AwaitingRetry(StageId),
    AllStagesCompleted,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::NotStarted => "not_started",
            SessionState::StageInProgress(_) => "stage_in_progress",
            SessionState::StageCompleted(_) => "stage_completed",
            SessionState::AwaitingRetry(_) => "awaiting_retry",
            SessionState::AllStagesCompleted => "all_stages_completed",
        }
    }

    pub fn stage(&self) -> Option<StageId> {
        match self {
            SessionState::StageInProgress(s)
            | SessionState::StageCompleted(s)
            | SessionState::AwaitingRetry(s) => Some(*s),
            SessionState::NotStarted | SessionState::AllStagesCompleted => None,
        }
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// Restarting (`→ NotStarted`) is legal from anywhere. A stage in
    /// progress may re-enter itself (player reset).
    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (_, NotStarted) => true,
            (NotStarted, StageInProgress(_)) => true,
            (StageInProgress(a), StageInProgress(b)) => a == b,
            (StageInProgress(a), StageCompleted(b)) => a == b,
            (StageInProgress(a), AwaitingRetry(b)) => a == b,
            (AwaitingRetry(a), StageInProgress(b)) => a == b,
            (StageCompleted(a), StageInProgress(b)) => a != b,
            (StageCompleted(_), AllStagesCompleted) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.stage() {
            Some(stage) => write!(f, "{}({stage})", self.name()),
            None => f.write_str(self.name()),
        }
    }
}
