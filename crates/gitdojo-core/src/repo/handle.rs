//! Exclusive ownership of one seeded repository.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::domain::{SessionId, StageId};

/// The (session, stage) pair a repository belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptKey {
    pub session_id: SessionId,
    pub stage_id: StageId,
}

impl AttemptKey {
    pub fn new(session_id: SessionId, stage_id: StageId) -> Self {
        Self {
            session_id,
            stage_id,
        }
    }
}

impl std::fmt::Display for AttemptKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/stage-{}", self.session_id.short(), self.stage_id)
    }
}

/// An advanced command that was accepted but not executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedCommand {
    pub verb: String,
    pub raw: String,
    pub recorded_at: DateTime<Utc>,
}

/// A seeded repository. Not `Clone`: exactly one owner per attempt, and the
/// directory is removed when the handle is dropped.
#[derive(Debug)]
pub struct RepositoryHandle {
    key: AttemptKey,
    attempt: u32,
    dir: TempDir,
    simulated: Vec<SimulatedCommand>,
}

impl RepositoryHandle {
    pub(crate) fn new(key: AttemptKey, attempt: u32, dir: TempDir) -> Self {
        Self {
            key,
            attempt,
            dir,
            simulated: Vec::new(),
        }
    }

    pub fn key(&self) -> AttemptKey {
        self.key
    }

    /// 1 for the first seeding of this (session, stage), incremented per reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn simulated(&self) -> &[SimulatedCommand] {
        &self.simulated
    }

    pub fn record_simulated(&mut self, verb: &str, raw: &str) {
        self.simulated.push(SimulatedCommand {
            verb: verb.to_string(),
            raw: raw.to_string(),
            recorded_at: Utc::now(),
        });
    }

    /// Remove the repository from disk now, logging rather than failing if
    /// the directory cannot be deleted.
    pub fn destroy(self) {
        let key = self.key;
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(attempt = %key, path = %path.display(), error = %e, "failed to remove stage repository");
        } else {
            tracing::debug!(attempt = %key, "stage repository removed");
        }
    }
}
