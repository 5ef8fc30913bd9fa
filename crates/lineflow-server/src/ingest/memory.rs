//! In-process backends
//!
//! Memory implementations of the three pipeline seams. They back the test
//! suite and local runs without Postgres or S3, and can be told to fail so
//! error paths are reachable without a real outage.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::{IngestError, IngestResult};
use super::job_store::JobRepository;
use super::object_store::{ObjectStore, ObjectStream};
use super::record_store::RecordRepository;
use super::types::{Job, JobFilter, JobStatus, Record, Transition};

// ============================================================================
// Jobs
// ============================================================================

/// Job store over a `Vec`, kept in insertion order
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<Vec<Job>>,
    unavailable: AtomicBool,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pre-built job as is, e.g. one with a chosen `created_at`
    pub async fn insert(&self, job: Job) {
        self.jobs.write().await.push(job);
    }

    /// While set, every call fails with `Persistence`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn all(&self) -> Vec<Job> {
        self.jobs.read().await.clone()
    }

    fn check_available(&self) -> IngestResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IngestError::Persistence("job store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl JobRepository for MemoryJobStore {
    async fn create(&self, object_key: &str) -> IngestResult<Job> {
        self.check_available()?;
        let job = Job::new(object_key);
        self.jobs.write().await.push(job.clone());
        Ok(job)
    }

    async fn claim_oldest_pending(&self) -> IngestResult<Option<Job>> {
        self.check_available()?;
        let jobs = self.jobs.read().await;

        let oldest = jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.status == JobStatus::Pending)
            .min_by_key(|(index, job)| (job.created_at, *index))
            .map(|(_, job)| job.clone());

        Ok(oldest)
    }

    async fn transition(&self, job_id: Uuid, transition: Transition) -> IngestResult<Job> {
        self.check_available()?;
        let mut jobs = self.jobs.write().await;

        let job = jobs
            .iter_mut()
            .find(|job| job.id == job_id)
            .ok_or(IngestError::JobNotFound(job_id))?;

        if !job.status.can_transition_to(transition.to) {
            return Err(IngestError::InvalidTransition {
                job_id,
                from: job.status,
                to: transition.to,
            });
        }

        job.apply(&transition, Utc::now());
        Ok(job.clone())
    }

    async fn get(&self, job_id: Uuid) -> IngestResult<Job> {
        self.check_available()?;
        self.jobs
            .read()
            .await
            .iter()
            .find(|job| job.id == job_id)
            .cloned()
            .ok_or(IngestError::JobNotFound(job_id))
    }

    async fn list(&self, filter: &JobFilter) -> IngestResult<Vec<Job>> {
        self.check_available()?;
        let jobs = self.jobs.read().await;

        let mut matching: Vec<(usize, &Job)> = jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| filter.status.map_or(true, |s| job.status == s))
            .collect();
        matching.sort_by(|(ia, a), (ib, b)| (b.created_at, ib).cmp(&(a.created_at, ia)));

        Ok(matching
            .into_iter()
            .skip(usize::try_from(filter.offset).unwrap_or(0))
            .take(usize::try_from(filter.limit).unwrap_or(0))
            .map(|(_, job)| job.clone())
            .collect())
    }
}

// ============================================================================
// Records
// ============================================================================

/// Record store that also remembers the size of every bulk write
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<Vec<Record>>,
    flush_sizes: RwLock<Vec<usize>>,
    /// Bulk writes still allowed once `limited` is set
    writes_left: AtomicUsize,
    limited: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `n` bulk writes succeed, then fail every later one with `Persistence`
    pub fn fail_writes_after(&self, n: usize) {
        self.writes_left.store(n, Ordering::SeqCst);
        self.limited.store(true, Ordering::SeqCst);
    }

    pub async fn records(&self) -> Vec<Record> {
        self.records.read().await.clone()
    }

    pub async fn records_for(&self, object_key: &str) -> Vec<Record> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.original_file == object_key)
            .cloned()
            .collect()
    }

    /// Size of each successful bulk write, in call order
    pub async fn flush_sizes(&self) -> Vec<usize> {
        self.flush_sizes.read().await.clone()
    }
}

#[async_trait]
impl RecordRepository for MemoryRecordStore {
    async fn bulk_insert(&self, records: Vec<Record>) -> IngestResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        if self.limited.load(Ordering::SeqCst) {
            let allowed = self
                .writes_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if !allowed {
                return Err(IngestError::Persistence("record store rejected write".to_string()));
            }
        }

        self.flush_sizes.write().await.push(records.len());
        self.records.write().await.extend(records);
        Ok(())
    }

    async fn count_for_file(&self, object_key: &str) -> IngestResult<i64> {
        let count = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.original_file == object_key)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

// ============================================================================
// Objects
// ============================================================================

#[derive(Clone)]
enum StoredObject {
    Complete(Bytes),
    /// Delivers `data`, then fails the read with `error`
    Truncated { data: Bytes, error: String },
}

/// Object store over a map of key to bytes
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    opens: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.objects
            .write()
            .await
            .insert(key.into(), StoredObject::Complete(data.into()));
    }

    /// Store an object whose stream breaks with a transfer fault after `data`
    pub async fn insert_truncated(
        &self,
        key: impl Into<String>,
        data: impl Into<Bytes>,
        error: impl Into<String>,
    ) {
        self.objects.write().await.insert(
            key.into(),
            StoredObject::Truncated {
                data: data.into(),
                error: error.into(),
            },
        );
    }

    /// Stored bytes of `key`; `None` for missing or truncated objects
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        match self.objects.read().await.get(key) {
            Some(StoredObject::Complete(data)) => Some(data.clone()),
            _ => None,
        }
    }

    /// Number of successful `open_read_stream` calls
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn open_read_stream(&self, key: &str) -> IngestResult<ObjectStream> {
        let object = self
            .objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| IngestError::ObjectNotFound(key.to_string()))?;

        self.opens.fetch_add(1, Ordering::SeqCst);

        let stream: ObjectStream = match object {
            StoredObject::Complete(data) => Box::new(io::Cursor::new(data)),
            StoredObject::Truncated { data, error } => {
                Box::new(io::Cursor::new(data).chain(FailingRead { error: Some(error) }))
            }
        };
        Ok(stream)
    }

    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: Option<String>,
    ) -> IngestResult<()> {
        self.insert(key, data).await;
        Ok(())
    }
}

/// Reader that fails its first read, then reports end of stream
struct FailingRead {
    error: Option<String>,
}

impl AsyncRead for FailingRead {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.error.take() {
            Some(message) => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                message,
            ))),
            None => Poll::Ready(Ok(())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_claim_is_fifo_and_does_not_change_status() {
        let store = MemoryJobStore::new();
        let now = Utc::now();

        let mut late = Job::new("late.txt");
        late.created_at = now;
        let mut early = Job::new("early.txt");
        early.created_at = now - Duration::seconds(10);
        store.insert(late).await;
        store.insert(early.clone()).await;

        let claimed = store.claim_oldest_pending().await.unwrap().unwrap();
        assert_eq!(claimed.id, early.id);
        assert_eq!(store.get(early.id).await.unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_claim_breaks_ties_by_insertion_order() {
        let store = MemoryJobStore::new();
        let at = Utc::now();

        let mut first = Job::new("first.txt");
        first.created_at = at;
        let mut second = Job::new("second.txt");
        second.created_at = at;
        store.insert(first.clone()).await;
        store.insert(second).await;

        let claimed = store.claim_oldest_pending().await.unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
    }

    #[tokio::test]
    async fn test_transition_rejects_illegal_moves() {
        let store = MemoryJobStore::new();
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

        let processing = store.transition(job.id, Transition::processing()).await.unwrap();
        assert!(processing.started_at.is_some());
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let store = MemoryJobStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.get(id).await,
            Err(IngestError::JobNotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_list_newest_first_with_status_filter() {
        let store = MemoryJobStore::new();
        let a = store.create("a.txt").await.unwrap();
        let b = store.create("b.txt").await.unwrap();
        store.transition(a.id, Transition::failed("nope")).await.unwrap();

        let all = store.list(&JobFilter::default()).await.unwrap();
        assert_eq!(all.iter().map(|j| j.id).collect::<Vec<_>>(), vec![b.id, a.id]);

        let failed = store
            .list(&JobFilter::new(Some(JobStatus::Failed), None, None))
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, a.id);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_with_persistence() {
        let store = MemoryJobStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.claim_oldest_pending().await,
            Err(IngestError::Persistence(_))
        ));
    }

    #[tokio::test]
    async fn test_record_store_fails_after_write_limit() {
        let store = MemoryRecordStore::new();
        store.fail_writes_after(1);

        let record = Record {
            content: "x".to_string(),
            original_file: "f".to_string(),
        };
        store.bulk_insert(vec![record.clone()]).await.unwrap();
        assert!(store.bulk_insert(vec![record]).await.is_err());
        assert_eq!(store.flush_sizes().await, vec![1]);
        assert_eq!(store.count_for_file("f").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_truncated_object_fails_after_data() {
        let store = MemoryObjectStore::new();
        store.insert_truncated("t.txt", "abc", "reset").await;

        let mut stream = store.open_read_stream("t.txt").await.unwrap();
        let mut buf = Vec::new();
        let err = stream.read_to_end(&mut buf).await.unwrap_err();

        assert_eq!(buf, b"abc");
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let store = MemoryObjectStore::new();
        assert!(matches!(
            store.open_read_stream("nope").await,
            Err(IngestError::ObjectNotFound(key)) if key == "nope"
        ));
        assert_eq!(store.open_count(), 0);
    }
}
