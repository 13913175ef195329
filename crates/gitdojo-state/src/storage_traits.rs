//! Storage trait definitions for gitdojo
//!
//! `SessionLedger` is the persisted-record contract: one append-only entry per
//! completed session (player, per-stage metrics, final score, timestamp).
//! Ranking and scoring live in `gitdojo-core`; the ledger only stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Raw metrics for a single passed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMetrics {
    pub stage_id: u32,
    /// Successful player commands during the stage.
    pub commands: u32,
    /// Wall-clock time from first bootstrap to pass.
    pub elapsed_ms: u64,
    pub hint_used: bool,
    pub solution_used: bool,
    /// The stage was restarted because help was requested.
    pub repeated: bool,
}

/// One completed session as written to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session UUID (unique per record).
    pub session_id: String,
    pub player: String,
    /// Per-stage metrics in the order stages were passed.
    pub stages: Vec<StageMetrics>,
    /// Final score computed by the active scoring policy.
    pub score: f64,
    /// Number of stages in the catalog the session ran against.
    pub total_stage_count: u32,
    pub recorded_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Reject records that would corrupt the leaderboard.
    pub fn check(&self) -> StorageResult<()> {
        if self.session_id.trim().is_empty() {
            return Err(StorageError::InvalidRecord(
                "session_id must not be empty".to_string(),
            ));
        }
        if self.player.trim().is_empty() {
            return Err(StorageError::InvalidRecord(
                "player must not be empty".to_string(),
            ));
        }
        if !self.score.is_finite() {
            return Err(StorageError::InvalidRecord(format!(
                "score must be finite, got {}",
                self.score
            )));
        }
        Ok(())
    }
}

/// Append-only ledger of completed sessions.
///
/// Guarantees:
/// - `append` never overwrites: a second record with the same `session_id`
///   fails with `StorageError::DuplicateSession`.
/// - `list` returns records in append order (oldest first).
#[async_trait]
pub trait SessionLedger: Send + Sync {
    /// Append a completed session.
    async fn append(&self, record: SessionRecord) -> StorageResult<()>;

    /// All records, oldest first.
    async fn list(&self) -> StorageResult<Vec<SessionRecord>>;

    /// Records for one player, oldest first.
    async fn list_for_player(&self, player: &str) -> StorageResult<Vec<SessionRecord>>;
}
