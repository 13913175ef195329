//! Repository Bootstrapper: seeds a fresh repository for one stage attempt.
//!
//! Seeding order is fixed so the resulting commit graph is identical on
//! every run:
//!
//! 1. `init` with HEAD on the default branch, then the fixed identity
//! 2. base files, included in the first commit
//! 3. the initial commit sequence, commit `n` stamped `epoch + n`
//! 4. each named branch, created from its start point and given its commits
//! 5. checkout of the default branch
//! 6. optional hard reset of the default branch
//! 7. uncommitted working changes

use std::path::PathBuf;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::domain::{DojoError, Result, Scenario, SeedCommit, SeedSpec};
use crate::metrics::METRICS;
use crate::repo::{
    AttemptKey, CommitStamp, EngineError, EngineResult, RepositoryEngine, RepositoryHandle,
};

/// Creates [`RepositoryHandle`]s from scenario seeds.
pub struct RepositoryBootstrapper {
    engine: Arc<dyn RepositoryEngine>,
    workspace_root: PathBuf,
    attempts: u32,
}

impl RepositoryBootstrapper {
    pub fn new(engine: Arc<dyn RepositoryEngine>, config: &EngineConfig) -> Self {
        Self {
            engine,
            workspace_root: config.workspace_root.clone(),
            attempts: config.bootstrap_attempts.max(1),
        }
    }

    pub fn engine(&self) -> &Arc<dyn RepositoryEngine> {
        &self.engine
    }

    /// Destroy `prior` (if any) and seed a new repository for `key`.
    ///
    /// The prior handle is always gone when this returns, even on error.
    /// Each failure is retried up to the configured attempt count before
    /// surfacing as [`DojoError::RepositoryInit`].
    pub async fn prepare(
        &self,
        key: AttemptKey,
        prior: Option<RepositoryHandle>,
        scenario: &Scenario,
    ) -> Result<RepositoryHandle> {
        let attempt = match prior {
            Some(handle) => {
                if handle.key() != key {
                    warn!(expected = %key, found = %handle.key(), "replacing handle of another attempt");
                }
                let next = handle.attempt() + 1;
                handle.destroy();
                next
            }
            None => 1,
        };

        let mut last_error = None;
        for round in 1..=self.attempts {
            match self.seed_once(key, attempt, &scenario.seed).await {
                Ok(handle) => {
                    METRICS.inc_bootstraps();
                    debug!(attempt = %key, round, path = %handle.path().display(), "stage repository seeded");
                    return Ok(handle);
                }
                Err(e) => {
                    warn!(attempt = %key, round, error = %e, "stage bootstrap failed");
                    last_error = Some(e);
                }
            }
        }

        Err(DojoError::RepositoryInit {
            stage_id: key.stage_id,
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no bootstrap attempts configured".to_string()),
        })
    }

    async fn seed_once(
        &self,
        key: AttemptKey,
        attempt: u32,
        seed: &SeedSpec,
    ) -> EngineResult<RepositoryHandle> {
        tokio::fs::create_dir_all(&self.workspace_root).await?;
        let prefix = format!("{}-stage{}-", key.session_id.short(), key.stage_id);
        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(&self.workspace_root)?;
        // `dir` is removed on every early return below.
        seed_repository(self.engine.as_ref(), dir.path(), seed).await?;
        Ok(RepositoryHandle::new(key, attempt, dir))
    }

    /// See [`commit_graph_fingerprint`].
    pub async fn fingerprint(&self, handle: &RepositoryHandle) -> EngineResult<String> {
        commit_graph_fingerprint(self.engine.as_ref(), handle).await
    }
}

/// Apply a seed to an empty directory.
pub async fn seed_repository(
    engine: &dyn RepositoryEngine,
    repo: &std::path::Path,
    seed: &SeedSpec,
) -> EngineResult<()> {
    engine.init(repo, &seed.default_branch).await?;
    engine.configure_identity(repo, &seed.identity).await?;

    for (path, content) in &seed.files {
        engine.write_file(repo, path, content).await?;
    }

    let mut ordinal: i64 = 0;
    let stamp = |ordinal: &mut i64| {
        *ordinal += 1;
        CommitStamp {
            identity: seed.identity.clone(),
            timestamp: seed.epoch + *ordinal,
        }
    };

    for commit in &seed.commits {
        apply_commit(engine, repo, commit, &stamp(&mut ordinal)).await?;
    }

    // A seed with base files but no commits still records them.
    if seed.commits.is_empty() && !seed.files.is_empty() {
        let initial = SeedCommit {
            message: "Initial commit".to_string(),
            files: Default::default(),
        };
        apply_commit(engine, repo, &initial, &stamp(&mut ordinal)).await?;
    }

    for branch in &seed.branches {
        let start = branch
            .start_point
            .as_deref()
            .unwrap_or(seed.default_branch.as_str());
        engine.create_branch(repo, &branch.name, Some(start)).await?;
        engine.switch_branch(repo, &branch.name).await?;
        for commit in &branch.commits {
            apply_commit(engine, repo, commit, &stamp(&mut ordinal)).await?;
        }
    }

    if !seed.branches.is_empty() {
        engine.switch_branch(repo, &seed.default_branch).await?;
    }

    if let Some(target) = &seed.reset_to {
        let args = ["reset".to_string(), "--hard".to_string(), target.clone()];
        let out = engine.invoke(repo, &args).await?;
        if !out.success {
            return Err(EngineError::CommandFailed {
                command: args.join(" "),
                stderr: out.stderr.trim().to_string(),
            });
        }
    }

    for (path, content) in &seed.working_changes {
        engine.write_file(repo, path, content).await?;
    }

    Ok(())
}

async fn apply_commit(
    engine: &dyn RepositoryEngine,
    repo: &std::path::Path,
    commit: &SeedCommit,
    stamp: &CommitStamp,
) -> EngineResult<String> {
    for (path, content) in &commit.files {
        engine.write_file(repo, path, content).await?;
    }
    engine.stage_all(repo).await?;
    engine.commit(repo, &commit.message, Some(stamp)).await
}

/// SHA-256 over every branch head, the current branch, tags and the full
/// HEAD history (hash, parents, message). Two repositories with equal
/// fingerprints have identical commit graphs.
pub async fn commit_graph_fingerprint(
    engine: &dyn RepositoryEngine,
    handle: &RepositoryHandle,
) -> EngineResult<String> {
    let repo = handle.path();
    let mut hasher = Sha256::new();

    let mut branches = engine.branches(repo).await?;
    branches.sort_by(|a, b| a.name.cmp(&b.name));
    for branch in &branches {
        hasher.update(format!("branch {} {}\n", branch.name, branch.head));
    }

    let current = engine.current_branch(repo).await?;
    hasher.update(format!("current {}\n", current.as_deref().unwrap_or("(detached)")));

    let mut tags = engine.tags(repo).await?;
    tags.sort();
    for tag in &tags {
        hasher.update(format!("tag {tag}\n"));
    }

    for commit in engine.log(repo).await? {
        hasher.update(format!(
            "commit {} {}\n{}\n",
            commit.hash,
            commit.parents.join(","),
            commit.message
        ));
    }

    Ok(hex::encode(hasher.finalize()))
}
