//! List jobs query
//!
//! Query to list ingestion jobs, newest first.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::ingest::{IngestError, Job, JobFilter, JobRepository, JobStatus};

/// Query to list jobs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListJobsQuery {
    /// Filter by status (e.g. "PENDING", "failed")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Limit number of results (default 50, max 500)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    /// Offset for pagination
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

/// Response for list jobs query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<Job>,
    pub limit: i64,
    pub offset: i64,
}

/// Error type for list jobs query
#[derive(Debug, thiserror::Error)]
pub enum ListJobsError {
    #[error("Invalid status filter: {0}")]
    InvalidStatus(String),
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl From<ListJobsError> for AppError {
    fn from(err: ListJobsError) -> Self {
        match err {
            ListJobsError::InvalidStatus(_) => AppError::BadRequest(err.to_string()),
            ListJobsError::Ingest(e) => AppError::Ingest(e),
        }
    }
}

impl ListJobsQuery {
    pub fn to_filter(&self) -> Result<JobFilter, ListJobsError> {
        let status = self
            .status
            .as_deref()
            .map(|s| s.parse::<JobStatus>())
            .transpose()
            .map_err(ListJobsError::InvalidStatus)?;

        Ok(JobFilter::new(status, self.limit, self.offset))
    }
}

pub async fn handle(
    jobs: &dyn JobRepository,
    query: ListJobsQuery,
) -> Result<ListJobsResponse, ListJobsError> {
    let filter = query.to_filter()?;
    let found = jobs.list(&filter).await?;

    Ok(ListJobsResponse {
        jobs: found,
        limit: filter.limit,
        offset: filter.offset,
    })
}
