//! Shared fixtures for engine-backed integration tests (require `git`).

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gitdojo_core::repo::{
    BranchInfo, CommitInfo, CommitStamp, EngineError, EngineOutput, EngineResult, WorktreeStatus,
};
use gitdojo_core::{
    EngineConfig, GitCliEngine, Identity, RepositoryEngine, ScenarioCatalog, SessionLedger,
    SessionManager, StageRuntime,
};
use gitdojo_state::fakes::MemorySessionLedger;
use tempfile::TempDir;
use tokio::sync::Notify;

/// Two quick stages: create a branch, then tag the result.
pub const TWO_STAGE_CATALOG: &str = r#"
[[scenario]]
stage_id = 10
title = "Make a branch"
objective = "Create a branch called topic."
hint = "git branch <name>"
solution = "git branch topic"

[[scenario.seed.commits]]
message = "Start"
files = { "a.txt" = "a\n" }

[scenario.validation]
must_have = [{ type = "branch_exists", name = "topic" }]

[[scenario]]
stage_id = 20
title = "Tag it"
objective = "Tag HEAD as v1."
hint = "git tag <name>"
solution = "git tag v1"

[[scenario.seed.commits]]
message = "Start"
files = { "b.txt" = "b\n" }

[scenario.validation]
must_have = [{ type = "tag_exists", name = "v1" }]
"#;

pub struct Harness {
    pub manager: Arc<SessionManager>,
    pub ledger: Arc<MemorySessionLedger>,
    pub runtime: Arc<StageRuntime>,
    pub workspace: TempDir,
}

pub fn config(workspace: &TempDir) -> EngineConfig {
    EngineConfig::default()
        .with_workspace_root(workspace.path())
        .with_bootstrap_attempts(1)
}

pub fn harness_with_config(
    catalog: ScenarioCatalog,
    engine: Arc<dyn RepositoryEngine>,
    configure: impl FnOnce(EngineConfig) -> EngineConfig,
) -> Harness {
    let workspace = tempfile::tempdir().unwrap();
    let runtime = Arc::new(StageRuntime::new(
        Arc::new(catalog),
        engine,
        &configure(config(&workspace)),
    ));
    let ledger = Arc::new(MemorySessionLedger::new());
    let manager = Arc::new(SessionManager::new(
        Arc::clone(&runtime),
        Arc::clone(&ledger) as Arc<dyn SessionLedger>,
    ));
    Harness {
        manager,
        ledger,
        runtime,
        workspace,
    }
}

pub fn harness_with_engine(catalog: ScenarioCatalog, engine: Arc<dyn RepositoryEngine>) -> Harness {
    harness_with_config(catalog, engine, |config| config)
}

pub fn harness_with_timeout(
    catalog: ScenarioCatalog,
    engine: Arc<dyn RepositoryEngine>,
    timeout: Duration,
) -> Harness {
    harness_with_config(catalog, engine, |config| config.with_command_timeout(timeout))
}

pub fn harness(catalog: ScenarioCatalog) -> Harness {
    harness_with_engine(catalog, Arc::new(GitCliEngine::new()))
}

pub fn builtin() -> Harness {
    harness(ScenarioCatalog::builtin().unwrap())
}

pub fn two_stage() -> Harness {
    harness(ScenarioCatalog::from_toml_str(TWO_STAGE_CATALOG).unwrap())
}

/// Delegates to git. `git status` from the player can be parked until
/// released, and `init` can be made to fail a number of times.
pub struct ScriptedEngine {
    inner: GitCliEngine,
    gate_status: AtomicBool,
    failing_inits: AtomicU32,
    pub entered: Notify,
    pub release: Notify,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            inner: GitCliEngine::new(),
            gate_status: AtomicBool::new(false),
            failing_inits: AtomicU32::new(0),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Park the next player `git status` until `release` is notified.
    pub fn gate_next_status(&self) {
        self.gate_status.store(true, Ordering::SeqCst);
    }

    /// Make the next `n` repository inits fail.
    pub fn fail_next_inits(&self, n: u32) {
        self.failing_inits.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl RepositoryEngine for ScriptedEngine {
    async fn init(&self, repo: &Path, default_branch: &str) -> EngineResult<()> {
        let failing = self
            .failing_inits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(EngineError::CommandFailed {
                command: "init".to_string(),
                stderr: "scripted failure".to_string(),
            });
        }
        self.inner.init(repo, default_branch).await
    }

    async fn configure_identity(&self, repo: &Path, identity: &Identity) -> EngineResult<()> {
        self.inner.configure_identity(repo, identity).await
    }

    async fn write_file(&self, repo: &Path, path: &str, content: &str) -> EngineResult<()> {
        self.inner.write_file(repo, path, content).await
    }

    async fn read_file(&self, repo: &Path, path: &str) -> EngineResult<Option<String>> {
        self.inner.read_file(repo, path).await
    }

    async fn list_files(&self, repo: &Path) -> EngineResult<Vec<String>> {
        self.inner.list_files(repo).await
    }

    async fn stage_all(&self, repo: &Path) -> EngineResult<()> {
        self.inner.stage_all(repo).await
    }

    async fn commit(
        &self,
        repo: &Path,
        message: &str,
        stamp: Option<&CommitStamp>,
    ) -> EngineResult<String> {
        self.inner.commit(repo, message, stamp).await
    }

    async fn create_branch(
        &self,
        repo: &Path,
        name: &str,
        start_point: Option<&str>,
    ) -> EngineResult<()> {
        self.inner.create_branch(repo, name, start_point).await
    }

    async fn switch_branch(&self, repo: &Path, name: &str) -> EngineResult<()> {
        self.inner.switch_branch(repo, name).await
    }

    async fn delete_branch(&self, repo: &Path, name: &str) -> EngineResult<()> {
        self.inner.delete_branch(repo, name).await
    }

    async fn current_branch(&self, repo: &Path) -> EngineResult<Option<String>> {
        self.inner.current_branch(repo).await
    }

    async fn branches(&self, repo: &Path) -> EngineResult<Vec<BranchInfo>> {
        self.inner.branches(repo).await
    }

    async fn log(&self, repo: &Path) -> EngineResult<Vec<CommitInfo>> {
        self.inner.log(repo).await
    }

    async fn status(&self, repo: &Path) -> EngineResult<WorktreeStatus> {
        self.inner.status(repo).await
    }

    async fn stash_count(&self, repo: &Path) -> EngineResult<usize> {
        self.inner.stash_count(repo).await
    }

    async fn tags(&self, repo: &Path) -> EngineResult<Vec<String>> {
        self.inner.tags(repo).await
    }

    async fn invoke(&self, repo: &Path, args: &[String]) -> EngineResult<EngineOutput> {
        let is_status = args.first().map(String::as_str) == Some("status");
        if is_status && self.gate_status.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.invoke(repo, args).await
    }
}
