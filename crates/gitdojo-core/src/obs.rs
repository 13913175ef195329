//! Structured lifecycle events for play sessions.
//!
//! Every event is an `info!` line carrying an `event` field so log pipelines
//! can filter on it. Requests run inside [`session_span`] so every event
//! they emit carries the session id.

use tracing::info;

use crate::domain::{SessionId, StageId};

/// Span for one request against a session. Attach it with
/// `tracing::Instrument::instrument` so it survives across awaits.
pub fn session_span(session_id: &SessionId) -> tracing::Span {
    tracing::info_span!("gitdojo.session", session_id = %session_id)
}

/// Emit event: a player started a session at the given stage.
pub fn emit_session_started(session_id: &SessionId, player: &str, stage_id: StageId) {
    info!(event = "session.started", session_id = %session_id, player = %player, stage_id = stage_id);
}

/// Emit event: a command went through the gateway.
pub fn emit_command_executed(
    session_id: &SessionId,
    stage_id: StageId,
    verb: &str,
    disposition: &str,
    success: bool,
) {
    info!(
        event = "command.executed",
        session_id = %session_id,
        stage_id = stage_id,
        verb = %verb,
        disposition = %disposition,
        success = success,
    );
}

/// Emit event: validation ran against the stage repository.
pub fn emit_stage_validated(
    session_id: &SessionId,
    stage_id: StageId,
    passed: bool,
    failure: Option<&str>,
) {
    info!(
        event = "stage.validated",
        session_id = %session_id,
        stage_id = stage_id,
        passed = passed,
        failure = failure.unwrap_or(""),
    );
}

/// Emit event: the session moved past a passed stage.
pub fn emit_stage_advanced(session_id: &SessionId, from: StageId, to: Option<StageId>) {
    match to {
        Some(next) => info!(event = "stage.advanced", session_id = %session_id, from = from, to = next),
        None => info!(event = "stage.advanced", session_id = %session_id, from = from, to = "end"),
    }
}

/// Emit event: the stage repository was rebuilt from its seed.
pub fn emit_stage_reset(session_id: &SessionId, stage_id: StageId, reason: &str) {
    info!(event = "stage.reset", session_id = %session_id, stage_id = stage_id, reason = %reason);
}

/// Emit event: every stage passed.
pub fn emit_session_completed(session_id: &SessionId, player: &str, score: f64, stages: usize) {
    info!(
        event = "session.completed",
        session_id = %session_id,
        player = %player,
        score = score,
        stages = stages,
    );
}

/// Emit event: writing the session record failed (warning level).
pub fn emit_ledger_error(session_id: &SessionId, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "ledger.error", session_id = %session_id, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitters_do_not_panic_without_subscriber() {
        let id = SessionId::new();
        let _span = session_span(&id).entered();
        emit_session_started(&id, "mina", 1);
        emit_command_executed(&id, 1, "status", "executed", true);
        emit_stage_validated(&id, 1, false, Some("must_have file_exists(a) failed"));
        emit_stage_advanced(&id, 1, Some(2));
        emit_stage_advanced(&id, 2, None);
        emit_stage_reset(&id, 2, "hint");
        emit_session_completed(&id, "mina", 480.0, 2);
        emit_ledger_error(&id, &"disk full");
    }
}
