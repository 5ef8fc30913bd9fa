//! Get job query
//!
//! Query to get a single job by ID.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::ingest::{IngestError, Job, JobRepository};

/// Query to get a job by ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetJobQuery {
    pub job_id: String,
}

/// Error type for get job query
#[derive(Debug, thiserror::Error)]
pub enum GetJobError {
    #[error("Invalid job id: {0}")]
    InvalidId(String),
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl From<GetJobError> for AppError {
    fn from(err: GetJobError) -> Self {
        match err {
            GetJobError::InvalidId(_) => AppError::BadRequest(err.to_string()),
            GetJobError::Ingest(e) => AppError::Ingest(e),
        }
    }
}

pub async fn handle(jobs: &dyn JobRepository, query: GetJobQuery) -> Result<Job, GetJobError> {
    let job_id = Uuid::parse_str(query.job_id.trim())
        .map_err(|_| GetJobError::InvalidId(query.job_id.clone()))?;

    Ok(jobs.get(job_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::memory::MemoryJobStore;

    #[tokio::test]
    async fn test_get_existing_job() {
        let jobs = MemoryJobStore::new();
        let job = jobs.create("a.txt").await.unwrap();

        let found = handle(
            &jobs,
            GetJobQuery {
                job_id: job.id.to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(found, job);
    }

    #[tokio::test]
    async fn test_malformed_id() {
        let jobs = MemoryJobStore::new();
        let err = handle(
            &jobs,
            GetJobQuery {
                job_id: "not-a-uuid".to_string(),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, GetJobError::InvalidId(_)));
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let jobs = MemoryJobStore::new();
        let err = handle(
            &jobs,
            GetJobQuery {
                job_id: Uuid::new_v4().to_string(),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, GetJobError::Ingest(IngestError::JobNotFound(_))));
    }
}
