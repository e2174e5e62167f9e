//! Happy and failure paths of a single REQUIRED scope

use crate::*;
use serde_json::json;
use std::fmt;
use txscope::{
    current_resource, current_transaction, Cause, ContextCarrier, CoreError, KvAccessor, Outcome,
    TxState,
};

#[derive(Debug, Clone, PartialEq)]
struct InsufficientFunds {
    needed: u64,
}

impl fmt::Display for InsufficientFunds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "insufficient funds: need {}", self.needed)
    }
}

// =============================================================================
// HAPPY PATH
// =============================================================================

#[tokio::test]
async fn test_two_operations_then_success_commits() {
    let rt = create_runtime();
    let store = store_of(&rt);

    let outcome = rt
        .run(|cx| async move {
            KvAccessor::put(&cx, "account:a", json!(100))?;
            tokio::task::yield_now().await;
            KvAccessor::put(&cx, "account:b", json!(50))?;
            Ok::<_, CoreError>(current_transaction(&cx).cloned())
        })
        .await;

    let tx = outcome.into_result().unwrap().unwrap();
    assert_eq!(tx.state(), TxState::Committed);
    assert_eq!(store.get("account:a").unwrap().value, json!(100));
    assert_eq!(store.get("account:b").unwrap().value, json!(50));
    assert_eq!(rt.pool_stats().released, 1);
    assert_all_released(rt.pool_stats());
}

#[tokio::test]
async fn test_every_accessor_sees_entry_handle() {
    let rt = create_runtime();

    let outcome = rt
        .run(|cx| async move {
            let entry = current_resource(&cx)?.handle_id();
            let mut seen = Vec::new();
            for i in 0..5 {
                KvAccessor::put(&cx, format!("k{i}"), json!(i))?;
                tokio::time::sleep(Duration::from_millis(1)).await;
                seen.push(current_resource(&cx)?.handle_id());
            }
            Ok::<_, CoreError>((entry, seen))
        })
        .await;

    let (entry, seen) = outcome.into_result().unwrap();
    assert!(seen.iter().all(|h| *h == entry));
}

#[tokio::test]
async fn test_reads_see_own_writes_before_commit() {
    let rt = create_runtime();
    let store = store_of(&rt);

    let outcome = rt
        .run(|cx| {
            let store = Arc::clone(&store);
            async move {
                KvAccessor::put(&cx, "k", json!("pending"))?;
                assert_eq!(KvAccessor::get(&cx, "k")?, Some(json!("pending")));
                assert!(!store.contains("k"));
                Ok::<_, CoreError>(())
            }
        })
        .await;

    assert!(outcome.is_committed());
    assert!(store.contains("k"));
}

// =============================================================================
// FAILURE PATH
// =============================================================================

#[tokio::test]
async fn test_second_operation_fails_rolls_back_with_same_error() {
    let rt = create_runtime();
    let store = store_of(&rt);
    let mut captured = None;

    let outcome = rt
        .run(|cx| {
            captured = Some(cx.clone());
            async move {
                KvAccessor::put(&cx, "account:a", json!(100))
                    .map_err(|_| InsufficientFunds { needed: 0 })?;
                Err::<(), _>(InsufficientFunds { needed: 250 })
            }
        })
        .await;

    assert_eq!(
        outcome,
        Outcome::RolledBack(Cause::Error(InsufficientFunds { needed: 250 }))
    );
    let err = outcome.into_result().unwrap_err();
    assert_eq!(err.into_work_error(), Some(InsufficientFunds { needed: 250 }));

    let scope_cx: ContextCarrier = captured.unwrap();
    let tx = current_transaction(&scope_cx).unwrap();
    assert_eq!(tx.state(), TxState::RolledBack);
    assert!(!store.contains("account:a"));
    assert_all_released(rt.pool_stats());
}

#[tokio::test]
async fn test_driver_error_inside_work_is_work_error() {
    let rt = create_runtime();
    let store = store_of(&rt);
    store.faults().fail_next(txscope::FaultPoint::Write);

    let outcome = rt
        .run(|cx| async move { KvAccessor::put(&cx, "k", json!(1)) })
        .await;

    match outcome {
        Outcome::RolledBack(Cause::Error(CoreError::Driver(e))) => {
            assert_eq!(e.operation, "write");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_all_released(rt.pool_stats());
}

#[tokio::test]
async fn test_accessor_outside_scope_fails() {
    let rt = create_runtime();
    let root = ContextCarrier::empty();

    assert_eq!(
        KvAccessor::get(&root, "k").unwrap_err(),
        CoreError::NoActiveTransaction
    );
    assert_eq!(rt.metrics().total_begun, 0);
}
