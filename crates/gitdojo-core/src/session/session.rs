//! One player's play-through.
//!
//! Every operation either commits all of its session-state changes or none:
//! work that can fail (bootstrapping) happens before anything is assigned.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use gitdojo_state::SessionRecord;
use serde::{Deserialize, Serialize};

use super::state::SessionState;
use crate::bootstrap::RepositoryBootstrapper;
use crate::catalog::ScenarioCatalog;
use crate::config::EngineConfig;
use crate::domain::{DojoError, Result, Scenario, SessionId, StageId, StageOutcome};
use crate::gateway::{CommandGateway, CommandOutcome};
use crate::metrics::METRICS;
use crate::obs;
use crate::repo::{AttemptKey, RepositoryEngine, RepositoryHandle};
use crate::scoring::{ScoringPolicy, SessionMetrics, StandardScoring};
use crate::validation::{ValidationEngine, ValidationResult};

/// Shared, read-only collaborators of every session.
pub struct StageRuntime {
    catalog: Arc<ScenarioCatalog>,
    bootstrapper: RepositoryBootstrapper,
    gateway: CommandGateway,
    validator: ValidationEngine,
    scoring: Arc<dyn ScoringPolicy>,
}

impl StageRuntime {
    pub fn new(
        catalog: Arc<ScenarioCatalog>,
        engine: Arc<dyn RepositoryEngine>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            catalog,
            bootstrapper: RepositoryBootstrapper::new(Arc::clone(&engine), config),
            gateway: CommandGateway::new(Arc::clone(&engine), config.command_timeout),
            validator: ValidationEngine::new(engine),
            scoring: Arc::new(StandardScoring::default()),
        }
    }

    pub fn with_scoring(mut self, scoring: Arc<dyn ScoringPolicy>) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn catalog(&self) -> &ScenarioCatalog {
        &self.catalog
    }

    pub fn bootstrapper(&self) -> &RepositoryBootstrapper {
        &self.bootstrapper
    }

    pub fn scoring(&self) -> &dyn ScoringPolicy {
        self.scoring.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelpKind {
    Hint,
    Solution,
}

impl HelpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HelpKind::Hint => "hint",
            HelpKind::Solution => "solution",
        }
    }
}

/// What the player sees of the current stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageView {
    pub session_id: SessionId,
    pub stage_id: StageId,
    /// 1-based position in the catalog.
    pub position: usize,
    pub total_stages: usize,
    pub title: String,
    pub objective: String,
    pub constraints: Vec<String>,
    /// `None` while the repository awaits a rebuild.
    pub repo_path: Option<PathBuf>,
    pub attempt: u32,
    pub repeated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub command: CommandOutcome,
    pub validation: ValidationResult,
    pub stage_advanced: bool,
    pub next_stage: Option<StageView>,
    pub completed: bool,
    pub outcome: Option<StageOutcome>,
    /// Set by the manager once the session record is persisted.
    pub ledger_recorded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpResponse {
    pub text: String,
    /// This request reset the stage (first help within the stage).
    pub repeat_triggered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub player: String,
    pub state: SessionState,
    pub metrics: SessionMetrics,
    pub score: f64,
    pub completed_stage_ids: Vec<StageId>,
    pub total_stage_count: usize,
    pub started_at: DateTime<Utc>,
}

/// Live state of the stage being played.
struct StageAttempt {
    scenario: Arc<Scenario>,
    handle: Option<RepositoryHandle>,
    commands: u32,
    hint_used: bool,
    solution_used: bool,
    repeated: bool,
    started: Instant,
}

impl StageAttempt {
    fn new(scenario: Arc<Scenario>, handle: RepositoryHandle) -> Self {
        Self {
            scenario,
            handle: Some(handle),
            commands: 0,
            hint_used: false,
            solution_used: false,
            repeated: false,
            started: Instant::now(),
        }
    }

    fn stage_id(&self) -> StageId {
        self.scenario.stage_id
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn discard(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.destroy();
        }
    }
}

/// A single play-through.
pub struct Session {
    id: SessionId,
    player: String,
    state: SessionState,
    stage_index: usize,
    outcomes: Vec<StageOutcome>,
    started_at: DateTime<Utc>,
    attempt: Option<StageAttempt>,
}

impl Session {
    pub fn new(player: impl Into<String>) -> Result<Self> {
        let player = player.into().trim().to_string();
        if player.is_empty() {
            return Err(DojoError::InvalidPlayer(player));
        }
        Ok(Self {
            id: SessionId::new(),
            player,
            state: SessionState::NotStarted,
            stage_index: 0,
            outcomes: Vec::new(),
            started_at: Utc::now(),
            attempt: None,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn player(&self) -> &str {
        &self.player
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn outcomes(&self) -> &[StageOutcome] {
        &self.outcomes
    }

    /// Repository of the stage in progress, if one is currently seeded.
    pub fn handle(&self) -> Option<&RepositoryHandle> {
        self.attempt.as_ref().and_then(|a| a.handle.as_ref())
    }

    fn invalid(&self, operation: &'static str) -> DojoError {
        DojoError::InvalidState {
            state: self.state.to_string(),
            operation,
        }
    }

    /// The stage in progress, or `InvalidState` for `operation`.
    fn in_progress(&self, operation: &'static str) -> Result<StageId> {
        match (self.state, self.attempt.as_ref()) {
            (SessionState::StageInProgress(stage), Some(_)) => Ok(stage),
            _ => Err(self.invalid(operation)),
        }
    }

    fn key(&self, stage_id: StageId) -> AttemptKey {
        AttemptKey::new(self.id, stage_id)
    }

    /// `NotStarted → StageInProgress(first)`.
    pub async fn start(&mut self, rt: &StageRuntime) -> Result<StageView> {
        if self.state != SessionState::NotStarted {
            return Err(self.invalid("start"));
        }
        let scenario = rt
            .catalog
            .at(0)
            .cloned()
            .ok_or_else(|| self.invalid("start"))?;
        let next = SessionState::StageInProgress(scenario.stage_id);

        let handle = rt
            .bootstrapper
            .prepare(self.key(scenario.stage_id), None, &scenario)
            .await?;

        self.stage_index = 0;
        self.started_at = Utc::now();
        self.attempt = Some(StageAttempt::new(Arc::clone(&scenario), handle));
        self.state = next;
        obs::emit_session_started(&self.id, &self.player, scenario.stage_id);
        self.view(rt)
    }

    /// Run one command, validate, and advance when the stage passes.
    pub async fn submit_command(&mut self, rt: &StageRuntime, raw: &str) -> Result<SubmitResponse> {
        let stage_id = self.in_progress("submit a command")?;
        self.ensure_handle(rt).await?;

        let id = self.id;
        let Some(attempt) = self.attempt.as_mut() else {
            return Err(self.invalid("submit a command"));
        };
        let Some(handle) = attempt.handle.as_mut() else {
            return Err(self.invalid("submit a command"));
        };

        let command = rt.gateway.execute(handle, raw).await;
        obs::emit_command_executed(
            &id,
            stage_id,
            command.verb.as_deref().unwrap_or("-"),
            command.disposition.as_str(),
            command.success,
        );
        // Counted even if advancing fails below; the command did run.
        attempt.commands += u32::from(command.success);
        let commands = attempt.commands;

        let validation = rt.validator.evaluate(handle, &attempt.scenario).await;
        obs::emit_stage_validated(&id, stage_id, validation.passed, validation.reason());

        if !validation.passed {
            return Ok(SubmitResponse {
                command,
                validation,
                stage_advanced: false,
                next_stage: None,
                completed: false,
                outcome: None,
                ledger_recorded: false,
            });
        }

        let outcome = StageOutcome {
            stage_id,
            passed: true,
            commands,
            hint_used: attempt.hint_used,
            solution_used: attempt.solution_used,
            repeated: attempt.repeated,
            elapsed_ms: attempt.elapsed_ms(),
            completed_at: Utc::now(),
        };
        self.advance(rt, command, validation, outcome).await
    }

    /// `StageInProgress → StageCompleted → StageInProgress(next)` or
    /// `→ AllStagesCompleted`. The next stage is seeded before anything is
    /// committed, so a bootstrap failure leaves the session untouched.
    async fn advance(
        &mut self,
        rt: &StageRuntime,
        command: CommandOutcome,
        validation: ValidationResult,
        outcome: StageOutcome,
    ) -> Result<SubmitResponse> {
        let stage_id = outcome.stage_id;
        let completed_state = SessionState::StageCompleted(stage_id);
        if !self.state.can_transition_to(&completed_state) {
            return Err(self.invalid("complete the stage"));
        }

        let next_index = self.stage_index + 1;
        let next_attempt = match rt.catalog.at(next_index).cloned() {
            Some(scenario) => {
                if !completed_state.can_transition_to(&SessionState::StageInProgress(scenario.stage_id)) {
                    return Err(self.invalid("advance"));
                }
                let handle = rt
                    .bootstrapper
                    .prepare(self.key(scenario.stage_id), None, &scenario)
                    .await?;
                Some(StageAttempt::new(scenario, handle))
            }
            None => None,
        };

        // Commit point.
        if let Some(mut previous) = self.attempt.take() {
            previous.discard();
        }
        self.state = completed_state;
        self.outcomes.push(outcome.clone());
        METRICS.inc_stages_passed();

        let completed = next_attempt.is_none();
        let next_stage_id = next_attempt.as_ref().map(StageAttempt::stage_id);
        match next_attempt {
            Some(attempt) => {
                self.state = SessionState::StageInProgress(attempt.stage_id());
                self.stage_index = next_index;
                self.attempt = Some(attempt);
            }
            None => {
                self.state = SessionState::AllStagesCompleted;
            }
        }
        obs::emit_stage_advanced(&self.id, stage_id, next_stage_id);

        let next_stage = if completed {
            None
        } else {
            Some(self.view(rt)?)
        };
        Ok(SubmitResponse {
            command,
            validation,
            stage_advanced: true,
            next_stage,
            completed,
            outcome: Some(outcome),
            ledger_recorded: false,
        })
    }

    /// Return hint or solution text. The first help within a stage marks
    /// it repeated and replays it from a fresh repository; later requests
    /// only return the text.
    pub async fn request_help(&mut self, rt: &StageRuntime, kind: HelpKind) -> Result<HelpResponse> {
        let stage_id = self.in_progress("request help")?;
        let Some(attempt) = self.attempt.as_ref() else {
            return Err(self.invalid("request help"));
        };
        let text = match kind {
            HelpKind::Hint => attempt.scenario.hint.clone(),
            HelpKind::Solution => attempt.scenario.solution.clone(),
        };

        if attempt.repeated {
            if let Some(attempt) = self.attempt.as_mut() {
                match kind {
                    HelpKind::Hint => attempt.hint_used = true,
                    HelpKind::Solution => attempt.solution_used = true,
                }
            }
            return Ok(HelpResponse {
                text,
                repeat_triggered: false,
            });
        }

        let retry = SessionState::AwaitingRetry(stage_id);
        if !self.state.can_transition_to(&retry)
            || !retry.can_transition_to(&SessionState::StageInProgress(stage_id))
        {
            return Err(self.invalid("request help"));
        }

        self.rebootstrap(rt, kind.as_str()).await?;

        if let Some(attempt) = self.attempt.as_mut() {
            attempt.repeated = true;
            match kind {
                HelpKind::Hint => attempt.hint_used = true,
                HelpKind::Solution => attempt.solution_used = true,
            }
        }
        Ok(HelpResponse {
            text,
            repeat_triggered: true,
        })
    }

    /// Player-initiated reset; the repeat flag is left as it is.
    pub async fn reset_stage(&mut self, rt: &StageRuntime) -> Result<StageView> {
        let stage_id = self.in_progress("reset the stage")?;
        if !self
            .state
            .can_transition_to(&SessionState::StageInProgress(stage_id))
        {
            return Err(self.invalid("reset the stage"));
        }
        self.rebootstrap(rt, "player").await?;
        self.view(rt)
    }

    /// Replace the stage repository with a freshly seeded one. The old
    /// handle is destroyed first; if seeding then fails the slot stays
    /// empty and the next command seeds it again.
    async fn rebootstrap(&mut self, rt: &StageRuntime, reason: &str) -> Result<()> {
        let id = self.id;
        let Some(attempt) = self.attempt.as_mut() else {
            return Err(self.invalid("reset the stage"));
        };
        let stage_id = attempt.stage_id();
        let prior = attempt.handle.take();
        let handle = rt
            .bootstrapper
            .prepare(AttemptKey::new(id, stage_id), prior, &attempt.scenario)
            .await?;
        attempt.handle = Some(handle);
        obs::emit_stage_reset(&id, stage_id, reason);
        Ok(())
    }

    async fn ensure_handle(&mut self, rt: &StageRuntime) -> Result<()> {
        let id = self.id;
        if let Some(attempt) = self.attempt.as_mut() {
            if attempt.handle.is_none() {
                let stage_id = attempt.stage_id();
                let handle = rt
                    .bootstrapper
                    .prepare(AttemptKey::new(id, stage_id), None, &attempt.scenario)
                    .await?;
                attempt.handle = Some(handle);
                obs::emit_stage_reset(&id, stage_id, "recover");
            }
        }
        Ok(())
    }

    /// Any state → `NotStarted` under a fresh id, with history discarded.
    pub fn restart(&mut self) -> SessionId {
        if let Some(mut attempt) = self.attempt.take() {
            attempt.discard();
        }
        self.id = SessionId::new();
        self.state = SessionState::NotStarted;
        self.stage_index = 0;
        self.outcomes.clear();
        self.started_at = Utc::now();
        self.id
    }

    /// Drop the stage repository, if any.
    pub fn close(&mut self) {
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.discard();
        }
    }

    pub fn view(&self, rt: &StageRuntime) -> Result<StageView> {
        let attempt = match (self.state, self.attempt.as_ref()) {
            (SessionState::StageInProgress(_), Some(attempt)) => attempt,
            _ => return Err(self.invalid("view the stage")),
        };
        let scenario = &attempt.scenario;
        Ok(StageView {
            session_id: self.id,
            stage_id: scenario.stage_id,
            position: self.stage_index + 1,
            total_stages: rt.catalog.len(),
            title: scenario.title.clone(),
            objective: scenario.objective.clone(),
            constraints: scenario.constraints.clone(),
            repo_path: attempt.handle.as_ref().map(|h| h.path().to_path_buf()),
            attempt: attempt.handle.as_ref().map_or(0, RepositoryHandle::attempt),
            repeated: attempt.repeated,
        })
    }

    pub fn metrics(&self) -> SessionMetrics {
        SessionMetrics::from_outcomes(&self.outcomes)
    }

    pub fn summary(&self, rt: &StageRuntime) -> SessionSummary {
        let metrics = self.metrics();
        SessionSummary {
            session_id: self.id,
            player: self.player.clone(),
            state: self.state,
            score: rt.scoring().score(&metrics),
            metrics,
            completed_stage_ids: self.outcomes.iter().map(|o| o.stage_id).collect(),
            total_stage_count: rt.catalog.len(),
            started_at: self.started_at,
        }
    }

    /// Persisted form of a finished session.
    pub fn to_record(&self, rt: &StageRuntime) -> SessionRecord {
        SessionRecord {
            session_id: self.id.to_string(),
            player: self.player.clone(),
            stages: self.outcomes.iter().map(StageOutcome::to_metrics).collect(),
            score: rt.scoring().score(&self.metrics()),
            total_stage_count: u32::try_from(rt.catalog.len()).unwrap_or(u32::MAX),
            recorded_at: Utc::now(),
        }
    }
}
