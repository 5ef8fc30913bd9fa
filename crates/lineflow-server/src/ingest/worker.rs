//! Ingestion worker
//!
//! Runs exactly one job per call: claim the oldest PENDING job, mark it
//! PROCESSING, stream its object through the batch accumulator and mark it
//! COMPLETED. Any failure after the claim marks that same job FAILED with the
//! error message; the failure does not escape as an `Err`.
//!
//! ```text
//! Idle -> Claimed -> Streaming -> Finalizing -> Completed
//!            \           \            \
//!             +-----------+------------+-----> Failed
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use super::batch::BatchAccumulator;
use super::error::{IngestError, IngestResult};
use super::job_store::JobRepository;
use super::object_store::ObjectStore;
use super::reader::{LineReader, DEFAULT_MAX_LINE_BYTES};
use super::record_store::RecordRepository;
use super::types::{Job, Transition};

/// Where a run currently is, or where it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Idle,
    Claimed,
    Streaming,
    Finalizing,
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerPhase::Idle => "idle",
            WorkerPhase::Claimed => "claimed",
            WorkerPhase::Streaming => "streaming",
            WorkerPhase::Finalizing => "finalizing",
        };
        f.write_str(name)
    }
}

/// Result of one worker run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No PENDING job was found
    Idle,
    Completed {
        job_id: Uuid,
        object_key: String,
        lines_processed: u64,
    },
    Failed {
        job_id: Uuid,
        phase: WorkerPhase,
        error: String,
    },
}

impl RunOutcome {
    pub fn is_idle(&self) -> bool {
        matches!(self, RunOutcome::Idle)
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Per-read stall timeout; `None` waits forever
    pub read_timeout: Option<Duration>,
    pub max_line_bytes: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            read_timeout: Some(Duration::from_secs(300)),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

pub struct IngestionWorker {
    jobs: Arc<dyn JobRepository>,
    records: Arc<dyn RecordRepository>,
    objects: Arc<dyn ObjectStore>,
    config: WorkerConfig,
}

impl IngestionWorker {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        records: Arc<dyn RecordRepository>,
        objects: Arc<dyn ObjectStore>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            jobs,
            records,
            objects,
            config,
        }
    }

    /// Process at most one job.
    ///
    /// Returns `Err` only when no job could be claimed because the job store
    /// failed, or when a failed job could not be marked FAILED.
    pub async fn run_once(&self) -> IngestResult<RunOutcome> {
        let Some(job) = self.jobs.claim_oldest_pending().await? else {
            return Ok(RunOutcome::Idle);
        };

        let span = info_span!("ingest_job", job_id = %job.id, object_key = %job.object_key);
        self.process(job).instrument(span).await
    }

    async fn process(&self, job: Job) -> IngestResult<RunOutcome> {
        info!("Claimed job");

        let mut phase = WorkerPhase::Claimed;
        match self.execute(&job, &mut phase).await {
            Ok(lines_processed) => {
                info!(lines_processed, "Job completed");
                Ok(RunOutcome::Completed {
                    job_id: job.id,
                    object_key: job.object_key,
                    lines_processed,
                })
            }
            Err(e) => self.fail(job.id, phase, e).await,
        }
    }

    async fn execute(&self, job: &Job, phase: &mut WorkerPhase) -> IngestResult<u64> {
        self.jobs.transition(job.id, Transition::processing()).await?;

        let stream = self.objects.open_read_stream(&job.object_key).await?;
        *phase = WorkerPhase::Streaming;

        let lines = LineReader::new(stream)
            .max_line_bytes(self.config.max_line_bytes)
            .read_timeout(self.config.read_timeout)
            .into_stream();
        let lines_processed = BatchAccumulator::new(self.records.clone(), &job.object_key)
            .drain(lines)
            .await?;

        *phase = WorkerPhase::Finalizing;
        self.jobs
            .transition(job.id, Transition::completed(lines_processed))
            .await?;

        Ok(lines_processed)
    }

    async fn fail(
        &self,
        job_id: Uuid,
        phase: WorkerPhase,
        cause: IngestError,
    ) -> IngestResult<RunOutcome> {
        let message = cause.to_string();
        error!(%phase, error = %message, "Job failed");

        if let Err(e) = self
            .jobs
            .transition(job_id, Transition::failed(message.clone()))
            .await
        {
            error!(error = %e, "Could not mark job as failed");
            return Err(e);
        }

        Ok(RunOutcome::Failed {
            job_id,
            phase,
            error: message,
        })
    }
}
