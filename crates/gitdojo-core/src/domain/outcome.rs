//! Session identity and per-stage outcomes.

use chrono::{DateTime, Utc};
use gitdojo_state::StageMetrics;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ordered stage identifier (1-based in the built-in catalog).
pub type StageId = u32;

/// Unique identifier for a play-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new random SessionId
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }

    /// First 8 hex chars, for directory names and log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(SessionId(Uuid::parse_str(s)?))
    }
}

/// Record of one passed stage. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage_id: StageId,
    pub passed: bool,
    /// Successful commands across every attempt at the stage.
    pub commands: u32,
    pub hint_used: bool,
    pub solution_used: bool,
    /// Help was requested and the stage was replayed from scratch.
    pub repeated: bool,
    /// Time from the stage's first bootstrap to the passing command.
    pub elapsed_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl StageOutcome {
    /// Count of help requests that carry a score penalty (0..=2).
    pub fn help_count(&self) -> u32 {
        u32::from(self.hint_used) + u32::from(self.solution_used)
    }

    /// Persisted form.
    pub fn to_metrics(&self) -> StageMetrics {
        StageMetrics {
            stage_id: self.stage_id,
            commands: self.commands,
            elapsed_ms: self.elapsed_ms,
            hint_used: self.hint_used,
            solution_used: self.solution_used,
            repeated: self.repeated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_round_trips_through_display() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn help_count_adds_both_flags() {
        let outcome = StageOutcome {
            stage_id: 3,
            passed: true,
            commands: 4,
            hint_used: true,
            solution_used: true,
            repeated: true,
            elapsed_ms: 1_500,
            completed_at: Utc::now(),
        };
        assert_eq!(outcome.help_count(), 2);
        let m = outcome.to_metrics();
        assert_eq!(m.stage_id, 3);
        assert_eq!(m.commands, 4);
        assert!(m.repeated);
    }
}
