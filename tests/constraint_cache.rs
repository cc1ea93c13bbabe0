//! Constraint Cache Tests
//!
//! - Constraints are fetched at most once per table within the TTL
//! - A fetch happens again once the TTL has elapsed
//! - Invalidation forces a refetch
//! - Failed fetches are not cached

use std::sync::Arc;
use std::time::Duration;

use tablegate::query::{InsertQuery, QueryError, QueryExecutor, RetryPolicy, Row, SelectQuery};
use tablegate::schema::{ConstraintCache, ManualClock};
use tablegate::store::{ColumnDef, MemoryStore, StoreError, TableDef, TABLE_INFO_FUNCTION};

const TTL: Duration = Duration::from_secs(300);

fn setup() -> (MemoryStore, Arc<ManualClock>, QueryExecutor) {
    let store = MemoryStore::new();
    for table in ["todos", "projects"] {
        store
            .create_table(
                table,
                TableDef::new(vec![
                    ColumnDef::required("id"),
                    ColumnDef::required("name"),
                    ColumnDef::optional("created_at"),
                ]),
            )
            .unwrap();
    }

    let clock = Arc::new(ManualClock::new());
    let cache = Arc::new(ConstraintCache::with_clock(TTL, clock.clone()));
    let executor = QueryExecutor::new(Arc::new(store.clone()))
        .with_cache(cache)
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1)));
    (store, clock, executor)
}

/// Repeated lookups within the TTL hit the store once.
#[tokio::test]
async fn test_cache_idempotence() {
    let (store, _clock, executor) = setup();

    let first = executor.get_table_constraints("todos").await.unwrap();
    for _ in 0..5 {
        let again = executor.get_table_constraints("todos").await.unwrap();
        assert_eq!(again, first);
    }
    assert_eq!(store.rpc_calls(TABLE_INFO_FUNCTION), 1);
    assert!(first.is_required("name"));
    assert!(!first.is_required("created_at"));

    let snapshot = executor.metrics().snapshot();
    assert_eq!(snapshot.constraint_fetches, 1);
    assert_eq!(snapshot.cache_hits, 5);
}

/// Validated operations share the cached entry.
#[tokio::test]
async fn test_validated_operations_share_cache() {
    let (store, _clock, executor) = setup();

    for i in 0..3 {
        let insert = InsertQuery::one("todos", Row::new().with("name", format!("n{i}"))).validated();
        executor.insert(&insert).await.unwrap();
    }
    executor
        .select(&SelectQuery::new("todos").validated())
        .await
        .unwrap();

    assert_eq!(store.rpc_calls(TABLE_INFO_FUNCTION), 1);
}

/// Each table has its own entry.
#[tokio::test]
async fn test_cache_is_per_table() {
    let (store, _clock, executor) = setup();

    executor.get_table_constraints("todos").await.unwrap();
    executor.get_table_constraints("projects").await.unwrap();
    executor.get_table_constraints("todos").await.unwrap();

    assert_eq!(store.rpc_calls(TABLE_INFO_FUNCTION), 2);
    assert_eq!(executor.cache().len(), 2);
}

/// An entry older than the TTL is refetched.
#[tokio::test]
async fn test_cache_expiry() {
    let (store, clock, executor) = setup();

    executor.get_table_constraints("todos").await.unwrap();
    clock.advance(TTL - Duration::from_secs(1));
    executor.get_table_constraints("todos").await.unwrap();
    assert_eq!(store.rpc_calls(TABLE_INFO_FUNCTION), 1);

    clock.advance(Duration::from_secs(2));
    executor.get_table_constraints("todos").await.unwrap();
    assert_eq!(store.rpc_calls(TABLE_INFO_FUNCTION), 2);
    assert_eq!(executor.metrics().snapshot().cache_evictions, 1);

    // Fresh again after the refetch
    executor.get_table_constraints("todos").await.unwrap();
    assert_eq!(store.rpc_calls(TABLE_INFO_FUNCTION), 2);
}

/// Invalidation forces the next lookup to fetch.
#[tokio::test]
async fn test_invalidation() {
    let (store, _clock, executor) = setup();

    executor.get_table_constraints("todos").await.unwrap();
    assert!(executor.invalidate_constraints("todos"));
    assert!(!executor.invalidate_constraints("todos"));

    executor.get_table_constraints("todos").await.unwrap();
    assert_eq!(store.rpc_calls(TABLE_INFO_FUNCTION), 2);
}

/// A failed fetch leaves nothing behind to serve.
#[tokio::test]
async fn test_failed_fetch_not_cached() {
    let (store, _clock, executor) = setup();
    store.fail_next(StoreError::authorization("permission denied for function"));

    let err = executor.get_table_constraints("todos").await.unwrap_err();
    assert!(matches!(err, QueryError::Authorization { .. }));
    assert!(executor.cache().is_empty());

    executor.get_table_constraints("todos").await.unwrap();
    assert_eq!(store.rpc_calls(TABLE_INFO_FUNCTION), 2);
}

/// A table the introspection function knows nothing about has no columns.
#[tokio::test]
async fn test_unknown_table_has_empty_constraints() {
    let (_store, _clock, executor) = setup();

    let constraints = executor.get_table_constraints("ghosts").await.unwrap();
    assert!(constraints.is_empty());

    let insert = InsertQuery::one("ghosts", Row::new().with("name", "boo")).validated();
    assert!(matches!(
        executor.insert(&insert).await,
        Err(QueryError::UnknownColumn { .. })
    ));
}
