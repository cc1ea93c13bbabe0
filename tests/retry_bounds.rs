//! Retry Envelope Tests
//!
//! - Transient failures are retried up to the attempt bound
//! - A success after failures stops the series
//! - Non-transient failures fail fast
//! - Cancellation and per-attempt timeouts end the series

use std::sync::Arc;
use std::time::Duration;

use tablegate::query::{QueryError, QueryExecutor, RetryPolicy, SelectQuery};
use tablegate::store::{ColumnDef, MemoryStore, StoreError, TableDef};
use tokio_util::sync::CancellationToken;

fn setup(policy: RetryPolicy) -> (MemoryStore, QueryExecutor) {
    let store = MemoryStore::new();
    store
        .create_table(
            "todos",
            TableDef::new(vec![ColumnDef::required("id"), ColumnDef::optional("title")]),
        )
        .unwrap();
    let executor = QueryExecutor::new(Arc::new(store.clone())).with_retry_policy(policy);
    (store, executor)
}

fn fast() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1))
}

/// Three transient failures exhaust three attempts.
#[tokio::test]
async fn test_retry_bound() {
    let (store, executor) = setup(fast());
    store.fail_times(3, StoreError::connection("connection reset"));

    let err = executor.select(&SelectQuery::new("todos")).await.unwrap_err();
    assert!(matches!(err, QueryError::Connection { .. }));
    assert!(err.is_retryable());
    assert_eq!(store.execute_calls(), 3);

    let snapshot = executor.metrics().snapshot();
    assert_eq!(snapshot.attempt_failures, 3);
    assert_eq!(snapshot.retries, 2);
    assert_eq!(snapshot.queries_failed, 1);
}

/// One failure then success takes two attempts.
#[tokio::test]
async fn test_fail_then_succeed() {
    let (store, executor) = setup(fast());
    store.fail_next(StoreError::unavailable("503 from upstream"));

    let rows = executor.select(&SelectQuery::new("todos")).await.unwrap();
    assert!(rows.is_empty());
    assert_eq!(store.execute_calls(), 2);
    assert_eq!(executor.metrics().snapshot().retries, 1);
}

/// Non-transient failures are not retried.
#[tokio::test]
async fn test_non_transient_fails_fast() {
    let (store, executor) = setup(fast());
    store.fail_times(3, StoreError::rejected("syntax error at or near"));

    match executor.select(&SelectQuery::new("todos")).await.unwrap_err() {
        QueryError::OperationFailed { attempts, source, .. } => {
            assert_eq!(attempts, 1);
            assert!(!source.is_transient());
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(store.execute_calls(), 1);
}

/// Authentication failures surface as their own kind.
#[tokio::test]
async fn test_authentication_not_retried() {
    let (store, executor) = setup(fast());
    store.fail_next(StoreError::authentication("JWT expired"));

    let err = executor.select(&SelectQuery::new("todos")).await.unwrap_err();
    assert!(matches!(err, QueryError::Authentication { .. }));
    assert_eq!(err.status_code(), 401);
    assert_eq!(store.execute_calls(), 1);
}

/// A single-attempt policy never sleeps.
#[tokio::test]
async fn test_single_attempt_policy() {
    let (store, executor) = setup(RetryPolicy::new(1, Duration::from_secs(60)));
    store.fail_next(StoreError::timeout("statement timeout"));

    let err = executor.select(&SelectQuery::new("todos")).await.unwrap_err();
    assert!(matches!(err, QueryError::Timeout { .. }));
    assert_eq!(store.execute_calls(), 1);
}

/// Cancelling during backoff ends the series.
#[tokio::test]
async fn test_cancel_during_backoff() {
    let (store, executor) = setup(RetryPolicy::new(3, Duration::from_secs(30)));
    store.fail_times(3, StoreError::connection("connection refused"));

    let token = CancellationToken::new();
    let query = SelectQuery::new("todos").cancel_on(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let started = tokio::time::Instant::now();
    let err = executor.select(&query).await.unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, QueryError::Cancelled { attempts: 1, .. }));
    assert_eq!(err.status_code(), 499);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(store.execute_calls(), 1);
}

/// An already-cancelled token prevents any attempt.
#[tokio::test]
async fn test_pre_cancelled() {
    let (store, executor) = setup(fast());
    let token = CancellationToken::new();
    token.cancel();

    let err = executor
        .select(&SelectQuery::new("todos").cancel_on(token))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Cancelled { attempts: 0, .. }));
    assert_eq!(store.total_calls(), 0);
}

/// Slow attempts time out and are retried as transient failures.
#[tokio::test]
async fn test_attempt_timeout() {
    let policy = RetryPolicy::new(2, Duration::from_millis(1))
        .with_attempt_timeout(Some(Duration::from_millis(20)));
    let (store, executor) = setup(policy);
    store.set_latency(Some(Duration::from_millis(500)));

    let err = executor.select(&SelectQuery::new("todos")).await.unwrap_err();
    assert!(matches!(err, QueryError::Timeout { .. }));
    assert_eq!(store.execute_calls(), 2);
}

/// Backoff doubles per attempt.
#[test]
fn test_backoff_schedule() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.backoff(1), Duration::from_secs(2));
    assert_eq!(policy.backoff(2), Duration::from_secs(4));
    assert_eq!(policy.max_total_delay(), Duration::from_secs(6));
}
