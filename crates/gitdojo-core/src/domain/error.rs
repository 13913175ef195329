//! Domain-level error taxonomy for gitdojo.
//!
//! Only request-level failures live here. Command failures and failed
//! validations are ordinary results (`CommandOutcome`, `ValidationResult`).

use super::outcome::{SessionId, StageId};

/// Errors produced while loading a scenario catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog parse error: {0}")]
    Parse(String),

    #[error("catalog contains no scenarios")]
    Empty,

    #[error("duplicate stage id: {0}")]
    DuplicateStage(StageId),

    #[error("invalid scenario {stage_id}: {reason}")]
    InvalidScenario { stage_id: StageId, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// gitdojo request-level errors.
#[derive(Debug, thiserror::Error)]
pub enum DojoError {
    #[error("scenario not found: stage {0}")]
    ScenarioNotFound(StageId),

    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("session {0} is already handling a request")]
    SessionBusy(SessionId),

    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        state: String,
        operation: &'static str,
    },

    #[error("invalid player name: {0:?}")]
    InvalidPlayer(String),

    #[error("repository init failed for stage {stage_id}: {reason}")]
    RepositoryInit { stage_id: StageId, reason: String },

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("ledger error: {0}")]
    Ledger(#[from] gitdojo_state::StorageError),
}

impl DojoError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DojoError::RepositoryInit { .. } | DojoError::SessionBusy(_)
        )
    }
}

/// Result type for gitdojo domain operations.
pub type Result<T> = std::result::Result<T, DojoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_not_found_display() {
        let err = DojoError::ScenarioNotFound(7);
        assert_eq!(err.to_string(), "scenario not found: stage 7");
    }

    #[test]
    fn test_invalid_state_display() {
        let err = DojoError::InvalidState {
            state: "all_stages_completed".to_string(),
            operation: "submit a command",
        };
        let msg = err.to_string();
        assert!(msg.contains("submit a command"));
        assert!(msg.contains("all_stages_completed"));
    }

    #[test]
    fn test_retryable_classification() {
        let init = DojoError::RepositoryInit {
            stage_id: 1,
            reason: "disk full".to_string(),
        };
        assert!(init.is_retryable());
        assert!(!DojoError::ScenarioNotFound(1).is_retryable());
    }
}
