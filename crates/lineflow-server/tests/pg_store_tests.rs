//! Postgres job and record store tests
//!
//! Each test creates its own database from `DATABASE_URL` and drops it at
//! the end; without `DATABASE_URL` the tests return early.

mod helpers;

use helpers::TestDb;
use lineflow_server::ingest::{
    IngestError, JobFilter, JobRepository, JobStatus, PgJobStore, PgRecordStore, Record,
    RecordRepository, Transition,
};
use uuid::Uuid;

fn record(content: &str, file: &str) -> Record {
    Record {
        content: content.to_string(),
        original_file: file.to_string(),
    }
}

#[tokio::test]
async fn test_create_and_get_job() {
    let Some(db) = TestDb::try_new().await else {
        return;
    };
    let store = PgJobStore::new(db.pool_cloned());

    let job = store.create("1700000000000-a.txt").await.unwrap();
    let fetched = store.get(job.id).await.unwrap();

    assert_eq!(fetched.object_key, "1700000000000-a.txt");
    assert_eq!(fetched.status, JobStatus::Pending);
    assert!(fetched.error.is_none());
    assert!(fetched.lines_processed.is_none());
    assert!(fetched.started_at.is_none());

    db.cleanup().await;
}

#[tokio::test]
async fn test_get_unknown_job() {
    let Some(db) = TestDb::try_new().await else {
        return;
    };
    let store = PgJobStore::new(db.pool_cloned());
    let id = Uuid::new_v4();

    let err = store.get(id).await.unwrap_err();
    assert!(matches!(err, IngestError::JobNotFound(missing) if missing == id));

    db.cleanup().await;
}

#[tokio::test]
async fn test_claim_returns_oldest_pending_without_changing_it() {
    let Some(db) = TestDb::try_new().await else {
        return;
    };
    let store = PgJobStore::new(db.pool_cloned());

    assert!(store.claim_oldest_pending().await.unwrap().is_none());

    let first = store.create("first.txt").await.unwrap();
    let second = store.create("second.txt").await.unwrap();

    let claimed = store.claim_oldest_pending().await.unwrap().unwrap();
    assert_eq!(claimed.id, first.id);
    assert_eq!(claimed.status, JobStatus::Pending);

    store.transition(first.id, Transition::processing()).await.unwrap();
    let claimed = store.claim_oldest_pending().await.unwrap().unwrap();
    assert_eq!(claimed.id, second.id);

    db.cleanup().await;
}

#[tokio::test]
async fn test_claim_breaks_created_at_ties_by_insertion_order() {
    let Some(db) = TestDb::try_new().await else {
        return;
    };
    let store = PgJobStore::new(db.pool_cloned());

    let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    for (i, id) in ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO ingest_jobs (id, object_key, status, created_at) \
             VALUES ($1, $2, 'PENDING', '2026-01-01T00:00:00Z')",
        )
        .bind(id)
        .bind(format!("tie-{}.txt", i))
        .execute(db.pool())
        .await
        .unwrap();
    }

    let claimed = store.claim_oldest_pending().await.unwrap().unwrap();
    assert_eq!(claimed.id, ids[0]);

    db.cleanup().await;
}

#[tokio::test]
async fn test_transition_lifecycle() {
    let Some(db) = TestDb::try_new().await else {
        return;
    };
    let store = PgJobStore::new(db.pool_cloned());
    let job = store.create("a.txt").await.unwrap();

    let processing = store.transition(job.id, Transition::processing()).await.unwrap();
    assert_eq!(processing.status, JobStatus::Processing);
    assert!(processing.started_at.is_some());
    assert!(processing.finished_at.is_none());

    let completed = store.transition(job.id, Transition::completed(2)).await.unwrap();
    assert_eq!(completed.status, JobStatus::Completed);
    assert_eq!(completed.lines_processed, Some(2));
    assert_eq!(completed.started_at, processing.started_at);
    assert!(completed.finished_at.is_some());

    db.cleanup().await;
}

#[tokio::test]
async fn test_invalid_transitions_are_rejected() {
    let Some(db) = TestDb::try_new().await else {
        return;
    };
    let store = PgJobStore::new(db.pool_cloned());
    let job = store.create("a.txt").await.unwrap();

    let err = store
        .transition(job.id, Transition::completed(1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IngestError::InvalidTransition {
            from: JobStatus::Pending,
            to: JobStatus::Completed,
            ..
        }
    ));

    store.transition(job.id, Transition::failed("boom")).await.unwrap();
    let err = store
        .transition(job.id, Transition::processing())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IngestError::InvalidTransition {
            from: JobStatus::Failed,
            ..
        }
    ));

    let job = store.get(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("boom"));

    let err = store
        .transition(Uuid::new_v4(), Transition::processing())
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::JobNotFound(_)));

    db.cleanup().await;
}

#[tokio::test]
async fn test_list_filters_and_orders_newest_first() {
    let Some(db) = TestDb::try_new().await else {
        return;
    };
    let store = PgJobStore::new(db.pool_cloned());

    let older = store.create("older.txt").await.unwrap();
    let newer = store.create("newer.txt").await.unwrap();
    store.transition(older.id, Transition::failed("missing")).await.unwrap();

    let all = store.list(&JobFilter::default()).await.unwrap();
    let ids: Vec<Uuid> = all.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![newer.id, older.id]);

    let failed = store
        .list(&JobFilter::new(Some(JobStatus::Failed), None, None))
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, older.id);

    let paged = store
        .list(&JobFilter::new(None, Some(1), Some(1)))
        .await
        .unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].id, older.id);

    db.cleanup().await;
}

#[tokio::test]
async fn test_bulk_insert_and_count() {
    let Some(db) = TestDb::try_new().await else {
        return;
    };
    let store = PgRecordStore::new(db.pool_cloned());

    store.bulk_insert(Vec::new()).await.unwrap();
    assert_eq!(store.count_for_file("a.txt").await.unwrap(), 0);

    store
        .bulk_insert(vec![record("hello", "a.txt"), record("  world ", "a.txt")])
        .await
        .unwrap();
    store.bulk_insert(vec![record("other", "b.txt")]).await.unwrap();

    assert_eq!(store.count_for_file("a.txt").await.unwrap(), 2);
    assert_eq!(store.count_for_file("b.txt").await.unwrap(), 1);

    let contents: Vec<String> = sqlx::query_scalar(
        "SELECT content FROM file_records WHERE original_file = 'a.txt' ORDER BY id",
    )
    .fetch_all(db.pool())
    .await
    .unwrap();
    assert_eq!(contents, vec!["hello", "  world "]);

    db.cleanup().await;
}

#[tokio::test]
async fn test_bulk_insert_stores_lines_containing_nul() {
    let Some(db) = TestDb::try_new().await else {
        return;
    };
    let store = PgRecordStore::new(db.pool_cloned());

    store
        .bulk_insert(vec![record("a\0b", "nul.txt"), record("after", "nul.txt")])
        .await
        .unwrap();

    assert_eq!(store.count_for_file("nul.txt").await.unwrap(), 2);
    let contents: Vec<String> = sqlx::query_scalar(
        "SELECT content FROM file_records WHERE original_file = 'nul.txt' ORDER BY id",
    )
    .fetch_all(db.pool())
    .await
    .unwrap();
    assert_eq!(contents, vec!["a\u{FFFD}b", "after"]);

    db.cleanup().await;
}

#[tokio::test]
async fn test_bulk_insert_spans_multiple_statements() {
    let Some(db) = TestDb::try_new().await else {
        return;
    };
    let store = PgRecordStore::new(db.pool_cloned());

    let records: Vec<Record> = (0..12_001)
        .map(|i| record(&format!("line {}", i), "big.txt"))
        .collect();
    store.bulk_insert(records).await.unwrap();

    assert_eq!(store.count_for_file("big.txt").await.unwrap(), 12_001);

    db.cleanup().await;
}
