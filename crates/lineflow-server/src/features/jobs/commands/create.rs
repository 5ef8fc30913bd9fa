//! Create job command
//!
//! Persists a PENDING job for an uploaded object and wakes the dispatcher.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::ingest::{Dispatcher, IngestError, JobRepository, JobStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobCommand {
    pub object_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub message: String,
    pub job_id: Uuid,
    pub status: JobStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateJobError {
    #[error("Object key is required and cannot be empty")]
    ObjectKeyRequired,
    #[error("Object key must not exceed 1024 characters")]
    ObjectKeyLength,
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl From<CreateJobError> for AppError {
    fn from(err: CreateJobError) -> Self {
        match err {
            CreateJobError::Ingest(e) => AppError::Ingest(e),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl CreateJobCommand {
    pub fn validate(&self) -> Result<(), CreateJobError> {
        if self.object_key.trim().is_empty() {
            return Err(CreateJobError::ObjectKeyRequired);
        }
        if self.object_key.len() > 1024 {
            return Err(CreateJobError::ObjectKeyLength);
        }
        Ok(())
    }
}

#[tracing::instrument(skip(jobs, dispatcher, command), fields(object_key = %command.object_key))]
pub async fn handle(
    jobs: &dyn JobRepository,
    dispatcher: &Dispatcher,
    command: CreateJobCommand,
) -> Result<CreateJobResponse, CreateJobError> {
    command.validate()?;

    let job = jobs.create(&command.object_key).await?;
    dispatcher.notify_job_created();

    tracing::info!(job_id = %job.id, "Job created");

    Ok(CreateJobResponse {
        message: "Job created successfully".to_string(),
        job_id: job.id,
        status: job.status,
    })
}
