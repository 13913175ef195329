//! Repository engine abstraction.
//!
//! The dojo never implements version control itself: every repository
//! operation goes through [`RepositoryEngine`], whose production
//! implementation shells out to `git` ([`GitCliEngine`]).

pub mod git_cli;
pub mod handle;

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::Identity;

pub use git_cli::GitCliEngine;
pub use handle::{AttemptKey, RepositoryHandle, SimulatedCommand};

/// Errors raised by a repository engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("unexpected engine output: {0}")]
    Parse(String),

    #[error("path escapes repository: {0}")]
    InvalidPath(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Fixed identity and timestamp for a reproducible commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitStamp {
    pub identity: Identity,
    /// Seconds since the Unix epoch, UTC.
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    pub head: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub parents: Vec<String>,
    pub message: String,
}

impl CommitInfo {
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

/// Working tree summary split the way `git status --porcelain` reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeStatus {
    pub staged: Vec<String>,
    pub modified: Vec<String>,
    pub untracked: Vec<String>,
}

impl WorktreeStatus {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.modified.is_empty() && self.untracked.is_empty()
    }
}

/// Raw result of a pass-through invocation. A non-zero exit is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl EngineOutput {
    /// stdout followed by stderr, trimmed.
    pub fn combined(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        out.push_str(self.stdout.trim_end());
        let err = self.stderr.trim_end();
        if !err.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(err);
        }
        out.trim().to_string()
    }
}

/// Version-control capability consumed by the bootstrapper, gateway and
/// validation engine. Every method addresses a repository by its root.
#[async_trait]
pub trait RepositoryEngine: Send + Sync {
    /// Create an empty repository whose unborn HEAD points at `default_branch`.
    async fn init(&self, repo: &Path, default_branch: &str) -> EngineResult<()>;

    /// Write repository-local `user.name` / `user.email`.
    async fn configure_identity(&self, repo: &Path, identity: &Identity) -> EngineResult<()>;

    async fn write_file(&self, repo: &Path, path: &str, content: &str) -> EngineResult<()>;

    /// `None` when the file does not exist.
    async fn read_file(&self, repo: &Path, path: &str) -> EngineResult<Option<String>>;

    /// Tracked plus untracked (non-ignored) files, sorted.
    async fn list_files(&self, repo: &Path) -> EngineResult<Vec<String>>;

    async fn stage_all(&self, repo: &Path) -> EngineResult<()>;

    /// Commit whatever is staged and return the new HEAD hash.
    async fn commit(
        &self,
        repo: &Path,
        message: &str,
        stamp: Option<&CommitStamp>,
    ) -> EngineResult<String>;

    async fn create_branch(
        &self,
        repo: &Path,
        name: &str,
        start_point: Option<&str>,
    ) -> EngineResult<()>;

    async fn switch_branch(&self, repo: &Path, name: &str) -> EngineResult<()>;

    async fn delete_branch(&self, repo: &Path, name: &str) -> EngineResult<()>;

    /// `None` on a detached HEAD.
    async fn current_branch(&self, repo: &Path) -> EngineResult<Option<String>>;

    async fn branches(&self, repo: &Path) -> EngineResult<Vec<BranchInfo>>;

    /// Commits reachable from HEAD, newest first. Empty for an unborn HEAD.
    async fn log(&self, repo: &Path) -> EngineResult<Vec<CommitInfo>>;

    async fn status(&self, repo: &Path) -> EngineResult<WorktreeStatus>;

    async fn stash_count(&self, repo: &Path) -> EngineResult<usize>;

    async fn tags(&self, repo: &Path) -> EngineResult<Vec<String>>;

    /// Run a raw verb (`args[0]`) with its arguments.
    async fn invoke(&self, repo: &Path, args: &[String]) -> EngineResult<EngineOutput>;
}

/// Resolve a repository-relative path, refusing anything that could leave
/// the repository root or reach into `.git`.
pub fn resolve_in_repo(repo: &Path, rel: &str) -> EngineResult<PathBuf> {
    let candidate = Path::new(rel);
    if rel.trim().is_empty() {
        return Err(EngineError::InvalidPath(rel.to_string()));
    }
    for component in candidate.components() {
        match component {
            Component::Normal(part) if part == ".git" => {
                return Err(EngineError::InvalidPath(rel.to_string()))
            }
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(EngineError::InvalidPath(rel.to_string())),
        }
    }
    Ok(repo.join(candidate))
}
