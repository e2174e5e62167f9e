//! Context follows the logical chain across workers and spawned tasks

use crate::*;
use serde_json::json;
use std::collections::HashSet;
use txscope::{current_resource, CoreError, HandleId, KvAccessor, Propagation};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_spawned_tasks_share_scope_handle() {
    let rt = create_runtime();
    let store = store_of(&rt);

    let outcome = rt
        .run(|cx| async move {
            let entry = current_resource(&cx)?.handle_id();
            let mut tasks = Vec::new();
            for i in 0..8 {
                let cx = cx.clone();
                tasks.push(tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    KvAccessor::put(&cx, format!("task:{i}"), json!(i))?;
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    Ok::<HandleId, CoreError>(current_resource(&cx)?.handle_id())
                }));
            }
            let mut seen = HashSet::new();
            for task in tasks {
                seen.insert(task.await.expect("task panicked")?);
            }
            Ok::<_, CoreError>((entry, seen))
        })
        .await;

    let (entry, seen) = outcome.into_result().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen.contains(&entry));
    assert_eq!(store.list_by_prefix("task:").len(), 8);
    assert_eq!(rt.pool_stats().acquired, 1);
    assert_all_released(rt.pool_stats());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scopes_do_not_share_handles() {
    let rt = create_runtime();

    let mut scopes = Vec::new();
    for i in 0..4 {
        let rt = rt.clone();
        scopes.push(tokio::spawn(async move {
            rt.run(|cx| async move {
                let first = current_resource(&cx)?.handle_id();
                KvAccessor::put(&cx, format!("scope:{i}"), json!(i))?;
                tokio::time::sleep(Duration::from_millis(5)).await;
                assert_eq!(current_resource(&cx)?.handle_id(), first);
                Ok::<_, CoreError>(first)
            })
            .await
            .into_result()
            .unwrap()
        }));
    }

    let mut handles = HashSet::new();
    for scope in scopes {
        handles.insert(scope.await.unwrap());
    }
    assert_eq!(handles.len(), 4);
    assert_eq!(rt.metrics().total_committed, 4);
    assert_all_released(rt.pool_stats());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_carrier_snapshot_unchanged_by_nested_scope() {
    let rt = create_runtime();
    let nested = rt.clone();

    let outcome = rt
        .run(|cx| async move {
            let before = cx.clone();
            let inner = nested
                .run_in_transaction(&cx, Propagation::RequiresNew, |inner| async move {
                    Ok::<_, CoreError>(inner)
                })
                .await
                .into_result()
                .unwrap();
            assert!(cx.ptr_eq(&before));
            assert!(!inner.ptr_eq(&cx));
            assert!(inner.generation() > cx.generation());
            Ok::<_, CoreError>(())
        })
        .await;

    assert!(outcome.is_committed());
}
