//! REQUIRED and REQUIRES_NEW composition

use crate::*;
use serde_json::json;
use std::collections::HashSet;
use txscope::{
    current_resource, current_transaction, Cause, CoreError, KvAccessor, Outcome, Propagation,
    TerminalSignal, TransactionCoordinator, TxState,
};

#[tokio::test]
async fn test_requires_new_failure_isolated_from_outer_commit() {
    let rt = create_runtime();
    let store = store_of(&rt);
    let nested = rt.clone();

    let outcome = rt
        .run(|outer| async move {
            KvAccessor::put(&outer, "order:1", json!("placed"))?;
            let outer_tx = current_transaction(&outer).cloned();

            let mut inner_tx: Option<Arc<TransactionCoordinator>> = None;
            let inner = nested
                .run_in_transaction(&outer, Propagation::RequiresNew, |inner| {
                    inner_tx = current_transaction(&inner).cloned();
                    async move {
                        KvAccessor::put(&inner, "audit:1", json!("attempt"))?;
                        Err::<(), _>(CoreError::InvalidConfig("audit sink offline".into()))
                    }
                })
                .await;
            assert!(matches!(inner, Outcome::RolledBack(Cause::Error(_))));

            // outer work continues after the inner failure
            KvAccessor::put(&outer, "order:1:status", json!("confirmed"))?;
            Ok::<_, CoreError>((outer_tx, inner_tx))
        })
        .await;

    let (outer_tx, inner_tx) = outcome.into_result().unwrap();
    let (outer_tx, inner_tx) = (outer_tx.unwrap(), inner_tx.unwrap());
    assert_eq!(outer_tx.state(), TxState::Committed);
    assert_eq!(inner_tx.state(), TxState::RolledBack);
    assert_eq!(inner_tx.suspended_id(), Some(outer_tx.id()));

    let handles: HashSet<_> = [outer_tx.handle().id(), inner_tx.handle().id()].into();
    assert_eq!(handles.len(), 2);
    let stats = rt.pool_stats();
    assert_eq!(stats.acquired, 2);
    assert_eq!(stats.released, 2);
    assert_all_released(stats);

    assert!(store.contains("order:1"));
    assert!(store.contains("order:1:status"));
    assert!(!store.contains("audit:1"));
}

#[tokio::test]
async fn test_requires_new_commit_survives_outer_rollback() {
    let rt = create_runtime();
    let store = store_of(&rt);
    let nested = rt.clone();

    let outcome = rt
        .run(|outer| async move {
            KvAccessor::put(&outer, "draft", json!(1))?;
            let inner = nested
                .run_in_transaction(&outer, Propagation::RequiresNew, |inner| async move {
                    KvAccessor::put(&inner, "log", json!("attempted"))
                })
                .await;
            assert!(inner.is_committed());
            Err::<(), _>(CoreError::NoActiveTransaction)
        })
        .await;

    assert!(outcome.is_rolled_back());
    assert!(!store.contains("draft"));
    assert!(store.contains("log"));
}

#[tokio::test]
async fn test_required_inside_requires_new_joins_inner() {
    let rt = create_runtime();
    let (a, b) = (rt.clone(), rt.clone());

    let outcome = rt
        .run(|outer| async move {
            let outer_handle = current_resource(&outer)?.handle_id();
            let inner = a
                .run_in_transaction(&outer, Propagation::RequiresNew, |inner| async move {
                    let inner_handle = current_resource(&inner)?.handle_id();
                    let joined = b
                        .run_in_transaction(&inner, Propagation::Required, |innermost| async move {
                            Ok::<_, CoreError>(current_resource(&innermost)?.handle_id())
                        })
                        .await;
                    match joined {
                        Outcome::Joined(TerminalSignal::Success(h)) => {
                            Ok::<_, CoreError>((inner_handle, h))
                        }
                        _ => Err(CoreError::NoActiveTransaction),
                    }
                })
                .await
                .into_result()
                .map_err(|_| CoreError::NoActiveTransaction)?;
            Ok::<_, CoreError>((outer_handle, inner))
        })
        .await;

    let (outer_handle, (inner_handle, innermost_handle)) = outcome.into_result().unwrap();
    assert_ne!(outer_handle, inner_handle);
    assert_eq!(inner_handle, innermost_handle);
    assert_eq!(rt.metrics().total_joined, 1);
    assert_all_released(rt.pool_stats());
}

#[tokio::test]
async fn test_requires_new_blocks_when_pool_exhausted() {
    init_tracing();
    let rt = TxRuntime::builder()
        .max_connections(1)
        .acquire_timeout(Duration::from_millis(30))
        .build()
        .unwrap();
    let nested = rt.clone();

    let outcome = rt
        .run(|outer| async move {
            let inner = nested
                .run_in_transaction(&outer, Propagation::RequiresNew, |_| async {
                    Ok::<_, CoreError>(())
                })
                .await;
            let err = inner.into_result().unwrap_err();
            Ok::<_, CoreError>(err.cause.coordination_error().cloned())
        })
        .await;

    let err = outcome.into_result().unwrap().unwrap();
    assert!(matches!(err, CoreError::ResourceExhausted { timeout_ms: 30 }));
    assert!(err.is_retryable());
    assert_all_released(rt.pool_stats());
}
