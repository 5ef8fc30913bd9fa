//! Job store
//!
//! CRUD over ingestion jobs plus the two operations the worker needs:
//! "claim oldest pending" and "transition status". Claiming does not change
//! the job; the worker follows it with an explicit PENDING -> PROCESSING
//! transition. Only one worker runs per process, which is what makes that
//! pair safe without a row lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::error::{IngestError, IngestResult};
use super::types::{Job, JobFilter, JobStatus, Transition};

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new PENDING job for `object_key`
    async fn create(&self, object_key: &str) -> IngestResult<Job>;

    /// Oldest PENDING job by creation time, ties broken by insertion order
    async fn claim_oldest_pending(&self) -> IngestResult<Option<Job>>;

    /// Move `job_id` to `transition.to`, returning the updated job.
    ///
    /// Fails with `InvalidTransition` if the job's current status is not an
    /// allowed source for the target status.
    async fn transition(&self, job_id: Uuid, transition: Transition) -> IngestResult<Job>;

    async fn get(&self, job_id: Uuid) -> IngestResult<Job>;

    /// Newest first
    async fn list(&self, filter: &JobFilter) -> IngestResult<Vec<Job>>;
}

const JOB_COLUMNS: &str =
    "id, object_key, status, error, lines_processed, created_at, started_at, finished_at";

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    object_key: String,
    status: String,
    error: Option<String>,
    lines_processed: Option<i64>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = IngestError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(|e| IngestError::Persistence(format!("job {}: {}", row.id, e)))?;

        Ok(Job {
            id: row.id,
            object_key: row.object_key,
            status,
            error: row.error,
            lines_processed: row.lines_processed,
            created_at: row.created_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

/// Postgres-backed job store (`ingest_jobs` table)
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find(&self, job_id: Uuid) -> IngestResult<Option<Job>> {
        let sql = format!("SELECT {} FROM ingest_jobs WHERE id = $1", JOB_COLUMNS);
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Job::try_from).transpose()
    }
}

#[async_trait]
impl JobRepository for PgJobStore {
    #[instrument(skip(self))]
    async fn create(&self, object_key: &str) -> IngestResult<Job> {
        let job = Job::new(object_key);
        let sql = format!(
            "INSERT INTO ingest_jobs (id, object_key, status, created_at) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            JOB_COLUMNS
        );

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(job.id)
            .bind(&job.object_key)
            .bind(JobStatus::Pending.as_str())
            .bind(job.created_at)
            .fetch_one(&self.pool)
            .await?;

        debug!(job_id = %row.id, "Job created");
        row.try_into()
    }

    async fn claim_oldest_pending(&self) -> IngestResult<Option<Job>> {
        let sql = format!(
            "SELECT {} FROM ingest_jobs WHERE status = $1 ORDER BY created_at, seq LIMIT 1",
            JOB_COLUMNS
        );

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(JobStatus::Pending.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Job::try_from).transpose()
    }

    #[instrument(skip(self, transition), fields(to = %transition.to))]
    async fn transition(&self, job_id: Uuid, transition: Transition) -> IngestResult<Job> {
        let now = Utc::now();
        let started_at = (transition.to == JobStatus::Processing).then_some(now);
        let finished_at = transition.to.is_terminal().then_some(now);
        let sources: Vec<String> = transition
            .to
            .allowed_sources()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let sql = format!(
            "UPDATE ingest_jobs SET \
                 status = $2, \
                 error = COALESCE($3, error), \
                 lines_processed = COALESCE($4, lines_processed), \
                 started_at = COALESCE($5, started_at), \
                 finished_at = COALESCE($6, finished_at) \
             WHERE id = $1 AND status = ANY($7) \
             RETURNING {}",
            JOB_COLUMNS
        );

        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(job_id)
            .bind(transition.to.as_str())
            .bind(&transition.error)
            .bind(transition.lines_processed)
            .bind(started_at)
            .bind(finished_at)
            .bind(sources)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.try_into(),
            None => {
                let current = self.get(job_id).await?;
                Err(IngestError::InvalidTransition {
                    job_id,
                    from: current.status,
                    to: transition.to,
                })
            }
        }
    }

    async fn get(&self, job_id: Uuid) -> IngestResult<Job> {
        self.find(job_id)
            .await?
            .ok_or(IngestError::JobNotFound(job_id))
    }

    async fn list(&self, filter: &JobFilter) -> IngestResult<Vec<Job>> {
        let sql = format!(
            "SELECT {} FROM ingest_jobs \
             WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY created_at DESC, seq DESC \
             LIMIT $2 OFFSET $3",
            JOB_COLUMNS
        );

        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Job::try_from).collect()
    }
}
