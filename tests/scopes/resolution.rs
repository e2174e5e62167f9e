//! Exactly-once resolution and failure reporting

use crate::*;
use serde_json::json;
use txscope::{
    begin_scope, current_transaction, end_scope, Cause, CoreError, DoubleReleasePolicy, FaultPoint,
    KvAccessor, Outcome, Propagation, RollbackReason, TerminalSignal, TxState,
};

#[tokio::test]
async fn test_commit_twice_is_illegal_and_releases_once() {
    let rt = create_runtime();
    let scope = rt.begin_scope(Propagation::Required).await.unwrap();
    let tx = scope.coordinator().clone();

    tx.commit().unwrap();
    let second = tx.commit().unwrap_err();

    assert!(matches!(
        second,
        CoreError::IllegalStateTransition {
            from: TxState::Committed,
            to: TxState::Committing,
            ..
        }
    ));
    assert_eq!(tx.state(), TxState::Committed);
    assert_eq!(rt.metrics().illegal_transitions, 1);
    assert_all_released(rt.pool_stats());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_commit_cancel_race_resolves_once() {
    let rt = create_runtime();

    for _ in 0..20 {
        let scope = rt.begin_scope(Propagation::Required).await.unwrap();
        let tx = scope.coordinator().clone();
        let (a, b) = (tx.clone(), tx.clone());

        let commit = tokio::task::spawn_blocking(move || a.commit());
        let rollback = tokio::task::spawn_blocking(move || b.rollback(RollbackReason::Cancelled));
        let (commit, rollback) = (commit.await.unwrap(), rollback.await.unwrap());

        assert!(commit.is_ok() ^ rollback.is_ok());
        let loser = commit.err().or(rollback.err()).unwrap();
        assert!(loser.is_illegal_transition());
        match tx.state() {
            TxState::Committed | TxState::RolledBack => {}
            other => panic!("unexpected terminal state {other}"),
        }
    }

    let metrics = rt.metrics();
    assert_eq!(metrics.total_committed + metrics.total_rolled_back, 20);
    assert_eq!(metrics.illegal_transitions, 20);
    assert_all_released(rt.pool_stats());
}

#[tokio::test]
async fn test_rollback_failure_keeps_primary_cause() {
    let rt = create_runtime();
    let store = store_of(&rt);
    store.faults().fail_next(FaultPoint::Rollback);

    let outcome = rt.run(|_cx| async { Err::<(), _>("primary") }).await;

    match outcome {
        Outcome::Failed {
            primary: Cause::Error("primary"),
            secondary: Some(CoreError::RollbackFailure { source, .. }),
        } => assert_eq!(source.operation, "rollback"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    let stats = rt.pool_stats();
    assert_eq!(stats.discarded, 1);
    assert_all_released(stats);
}

#[tokio::test]
async fn test_commit_failure_reports_and_discards() {
    let rt = create_runtime();
    let store = store_of(&rt);
    store.faults().fail_next(FaultPoint::Commit);

    let outcome = rt
        .run(|cx| async move { KvAccessor::put(&cx, "k", json!(1)) })
        .await;

    let err = outcome.into_result().unwrap_err();
    assert!(matches!(
        err.cause,
        Cause::Coordination(CoreError::CommitFailure {
            fallback_rollback: None,
            ..
        })
    ));
    assert!(!store.contains("k"));
    assert_eq!(rt.metrics().total_failed, 1);
    assert_eq!(rt.pool_stats().discarded, 1);
    assert_all_released(rt.pool_stats());

    // the pool recovers with a fresh connection
    let retry = rt
        .run(|cx| async move { KvAccessor::put(&cx, "k", json!(2)) })
        .await;
    assert!(retry.is_committed());
}

#[tokio::test]
async fn test_begin_failure_allocates_nothing() {
    let rt = create_runtime();
    let store = store_of(&rt);
    store.faults().fail_next(FaultPoint::Begin);

    let err = rt.begin_scope(Propagation::Required).await.unwrap_err();

    assert!(matches!(err, CoreError::BeginFailure { .. }));
    assert!(rt.active_transactions().is_empty());
    let metrics = rt.metrics();
    assert_eq!(metrics.total_begun, 0);
    assert_eq!(metrics.total_failed, 1);
    assert_all_released(rt.pool_stats());
}

#[tokio::test]
async fn test_manual_scope_free_functions() {
    let rt = create_runtime();
    let scope = begin_scope(rt.transactions(), Propagation::RequiresNew)
        .await
        .unwrap();
    KvAccessor::put(scope.carrier(), "k", json!(1)).unwrap();
    assert_eq!(rt.active_transactions().len(), 1);

    let outcome: Outcome<(), CoreError> = end_scope(scope, TerminalSignal::Success(()));

    assert!(outcome.is_committed());
    assert!(store_of(&rt).contains("k"));
}

#[tokio::test]
async fn test_work_cannot_resolve_enclosing_scope() {
    let rt = create_runtime();
    let store = store_of(&rt);
    let nested = rt.clone();

    let outcome = rt
        .run(|cx| async move {
            KvAccessor::put(&cx, "a", json!(1))?;

            // a scope begun inside the work owns only its own transaction
            let own = nested.begin_scope(Propagation::Required).await?;
            let ended: Outcome<(), CoreError> = nested.end_scope(own, TerminalSignal::Success(()));
            assert!(ended.is_committed());

            assert!(current_transaction(&cx).unwrap().is_active());
            Err::<(), _>(CoreError::NoActiveTransaction)
        })
        .await;

    assert_eq!(
        outcome,
        Outcome::RolledBack(Cause::Error(CoreError::NoActiveTransaction))
    );
    assert!(!store.contains("a"));
    assert_eq!(rt.metrics().illegal_transitions, 0);
    assert_all_released(rt.pool_stats());
}

#[tokio::test]
async fn test_double_release_fail_policy() {
    let rt = TxRuntime::builder()
        .double_release(DoubleReleasePolicy::Fail)
        .build()
        .unwrap();
    let scope = rt.begin_scope(Propagation::Required).await.unwrap();
    let tx = scope.coordinator().clone();
    tx.commit().unwrap();

    let err = rt.resources().release(tx.handle()).unwrap_err();

    assert!(matches!(err, CoreError::DoubleRelease { .. }));
    assert_eq!(rt.pool_stats().double_releases, 1);
    assert_eq!(rt.pool_stats().released, 1);
}

#[tokio::test]
async fn test_double_release_warn_policy() {
    let rt = TxRuntime::builder()
        .double_release(DoubleReleasePolicy::Warn)
        .build()
        .unwrap();
    let scope = rt.begin_scope(Propagation::Required).await.unwrap();
    let tx = scope.coordinator().clone();
    tx.commit().unwrap();

    rt.resources().release(tx.handle()).unwrap();

    assert_eq!(rt.pool_stats().double_releases, 1);
    assert_eq!(rt.pool_stats().released, 1);
}
