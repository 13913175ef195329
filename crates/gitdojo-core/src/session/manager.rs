//! Owns live sessions and serialises requests per session.
//!
//! Each session sits behind its own mutex. A request that finds the mutex
//! held fails immediately with `SessionBusy` instead of queueing, so one
//! player's slow command never stalls another request on the same session.

use std::collections::HashMap;
use std::sync::Arc;

use gitdojo_state::SessionLedger;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, Instrument};

use super::session::{
    HelpKind, HelpResponse, Session, SessionSummary, StageRuntime, StageView, SubmitResponse,
};
use crate::domain::{DojoError, Result, SessionId};
use crate::leaderboard::{rank_leaderboard, LeaderboardEntry};
use crate::metrics::METRICS;
use crate::obs;

type SessionSlot = Arc<Mutex<Session>>;

/// Entry point for front-ends: every operation addresses a session by id.
pub struct SessionManager {
    runtime: Arc<StageRuntime>,
    ledger: Arc<dyn SessionLedger>,
    sessions: RwLock<HashMap<SessionId, SessionSlot>>,
}

impl SessionManager {
    pub fn new(runtime: Arc<StageRuntime>, ledger: Arc<dyn SessionLedger>) -> Self {
        Self {
            runtime,
            ledger,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn runtime(&self) -> &StageRuntime {
        &self.runtime
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn lock(&self, id: SessionId) -> Result<OwnedMutexGuard<Session>> {
        let slot = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(DojoError::SessionNotFound(id))?;
        slot.try_lock_owned()
            .map_err(|_| DojoError::SessionBusy(id))
    }

    /// Create a session for `player` and seed its first stage. Nothing is
    /// registered if seeding fails.
    pub async fn start_session(&self, player: &str) -> Result<(SessionId, StageView)> {
        let mut session = Session::new(player)?;
        let id = session.id();
        let view = session
            .start(&self.runtime)
            .instrument(obs::session_span(&id))
            .await?;
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        Ok((id, view))
    }

    /// Run a command. When it completes the final stage the session record
    /// is appended to the ledger; a ledger failure is logged and reported
    /// through `ledger_recorded` but does not fail the request.
    pub async fn submit_command(&self, id: SessionId, raw: &str) -> Result<SubmitResponse> {
        let mut session = self.lock(id).await?;
        let span = obs::session_span(&id);
        let mut response = session
            .submit_command(&self.runtime, raw)
            .instrument(span.clone())
            .await?;

        if response.completed {
            let record = session.to_record(&self.runtime);
            obs::emit_session_completed(&id, &record.player, record.score, record.stages.len());
            match self.ledger.append(record).instrument(span).await {
                Ok(()) => response.ledger_recorded = true,
                Err(e) => obs::emit_ledger_error(&id, &e),
            }
            METRICS.flush();
        }
        Ok(response)
    }

    pub async fn request_hint(&self, id: SessionId) -> Result<HelpResponse> {
        self.request_help(id, HelpKind::Hint).await
    }

    pub async fn request_solution(&self, id: SessionId) -> Result<HelpResponse> {
        self.request_help(id, HelpKind::Solution).await
    }

    async fn request_help(&self, id: SessionId, kind: HelpKind) -> Result<HelpResponse> {
        let mut session = self.lock(id).await?;
        session
            .request_help(&self.runtime, kind)
            .instrument(obs::session_span(&id))
            .await
    }

    pub async fn reset_stage(&self, id: SessionId) -> Result<StageView> {
        let mut session = self.lock(id).await?;
        session
            .reset_stage(&self.runtime)
            .instrument(obs::session_span(&id))
            .await
    }

    /// Discard progress and re-register the session under a fresh id. The
    /// session is left `NotStarted`; call [`SessionManager::start`] next.
    pub async fn restart(&self, id: SessionId) -> Result<SessionId> {
        let mut session = self.lock(id).await?;
        let new_id = session.restart();

        let mut sessions = self.sessions.write().await;
        if let Some(slot) = sessions.remove(&id) {
            sessions.insert(new_id, slot);
        }
        debug!(old = %id, new = %new_id, "session restarted");
        Ok(new_id)
    }

    /// Start a `NotStarted` session (after [`SessionManager::restart`]).
    pub async fn start(&self, id: SessionId) -> Result<StageView> {
        let mut session = self.lock(id).await?;
        session
            .start(&self.runtime)
            .instrument(obs::session_span(&id))
            .await
    }

    pub async fn view(&self, id: SessionId) -> Result<StageView> {
        let session = self.lock(id).await?;
        session.view(&self.runtime)
    }

    pub async fn summary(&self, id: SessionId) -> Result<SessionSummary> {
        let session = self.lock(id).await?;
        Ok(session.summary(&self.runtime))
    }

    /// Remove a session and delete its repository. Sessions that never
    /// reached the end are not recorded.
    pub async fn end_session(&self, id: SessionId) -> Result<SessionSummary> {
        let mut session = self.lock(id).await?;
        session.close();
        let summary = session.summary(&self.runtime);
        self.sessions.write().await.remove(&id);
        debug!(session_id = %id, state = %summary.state, "session ended");
        Ok(summary)
    }

    /// Best score per player, highest first.
    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let records = self.ledger.list().await?;
        Ok(rank_leaderboard(&records, limit))
    }
}
