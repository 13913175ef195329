//! Per-session serialisation and command timeouts: a second request while
//! one is in flight is refused with `SessionBusy`, other sessions are
//! unaffected, and a hung command does not wedge its session.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::ScriptedEngine;
use gitdojo_core::{
    CommandErrorKind, DojoError, RepositoryEngine, ScenarioCatalog, SessionState,
};

#[tokio::test]
async fn second_request_on_busy_session_is_refused() {
    let engine = Arc::new(ScriptedEngine::new());
    engine.gate_next_status();
    let h = common::harness_with_engine(
        ScenarioCatalog::from_toml_str(common::TWO_STAGE_CATALOG).unwrap(),
        Arc::clone(&engine) as Arc<dyn RepositoryEngine>,
    );
    let (busy_id, _) = h.manager.start_session("mina").await.unwrap();
    let (other_id, _) = h.manager.start_session("joon").await.unwrap();

    let manager = Arc::clone(&h.manager);
    let in_flight =
        tokio::spawn(async move { manager.submit_command(busy_id, "git status").await });
    engine.entered.notified().await;

    let err = h.manager.request_hint(busy_id).await.unwrap_err();
    assert!(matches!(err, DojoError::SessionBusy(id) if id == busy_id));
    assert!(err.is_retryable());
    assert!(matches!(
        h.manager.submit_command(busy_id, "git log").await.unwrap_err(),
        DojoError::SessionBusy(_)
    ));

    // Another session is not blocked.
    let other = h
        .manager
        .submit_command(other_id, "git branch topic")
        .await
        .unwrap();
    assert!(other.stage_advanced);

    engine.release.notify_one();
    let first = in_flight.await.unwrap().unwrap();
    assert!(first.command.success);

    // Once the request finished the session accepts work again.
    let hint = h.manager.request_hint(busy_id).await.unwrap();
    assert!(hint.repeat_triggered);
}

#[tokio::test]
async fn sessions_progress_in_parallel() {
    let h = common::two_stage();
    let players = ["mina", "joon", "sora", "hana"];

    let started = futures::future::join_all(players.iter().map(|p| h.manager.start_session(p))).await;
    let ids: Vec<_> = started.into_iter().map(|r| r.unwrap().0).collect();
    assert_eq!(h.manager.session_count().await, players.len());

    let submitted = futures::future::join_all(
        ids.iter()
            .map(|id| h.manager.submit_command(*id, "git branch topic")),
    )
    .await;
    for response in submitted {
        let response = response.unwrap();
        assert!(response.stage_advanced);
        assert_eq!(response.next_stage.unwrap().stage_id, 20);
    }

    let mut repos: Vec<_> = Vec::new();
    for id in &ids {
        repos.push(h.manager.view(*id).await.unwrap().repo_path.unwrap());
    }
    repos.sort();
    repos.dedup();
    assert_eq!(repos.len(), players.len(), "every session owns its repository");
}

#[tokio::test]
async fn hung_command_times_out_without_touching_the_session() {
    let engine = Arc::new(ScriptedEngine::new());
    let h = common::harness_with_timeout(
        ScenarioCatalog::from_toml_str(common::TWO_STAGE_CATALOG).unwrap(),
        Arc::clone(&engine) as Arc<dyn RepositoryEngine>,
        Duration::from_millis(500),
    );
    let (id, view) = h.manager.start_session("mina").await.unwrap();
    let repo = view.repo_path.unwrap();

    // Never released: only the timeout ends this command.
    engine.gate_next_status();
    let hung = h.manager.submit_command(id, "git status").await.unwrap();
    assert!(!hung.command.success);
    assert_eq!(hung.command.error_kind, Some(CommandErrorKind::ExecutionFailed));
    assert!(hung.command.output.contains("timed out"), "{}", hung.command.output);
    assert!(!hung.stage_advanced);

    let summary = h.manager.summary(id).await.unwrap();
    assert_eq!(summary.state, SessionState::StageInProgress(10));
    assert!(summary.completed_stage_ids.is_empty());
    let after = h.manager.view(id).await.unwrap();
    assert_eq!(after.repo_path.as_deref(), Some(repo.as_path()));
    assert_eq!(after.attempt, 1);

    // The session accepts the next request, and the timed-out command
    // was not counted.
    let next = h
        .manager
        .submit_command(id, "git branch topic")
        .await
        .unwrap();
    assert!(next.stage_advanced);
    assert_eq!(next.outcome.unwrap().commands, 1);
}
