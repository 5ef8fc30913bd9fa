//! Core types for the ingestion pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Default number of jobs returned by a listing
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Upper bound on a single listing page
pub const MAX_LIST_LIMIT: i64 = 500;

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// States a job must be in to move into `self`
    pub fn allowed_sources(&self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[],
            JobStatus::Processing => &[JobStatus::Pending],
            JobStatus::Completed => &[JobStatus::Processing],
            JobStatus::Failed => &[JobStatus::Pending, JobStatus::Processing],
        }
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        next.allowed_sources().contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// One ingestion job: "ingest this stored object"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub object_key: String,
    pub status: JobStatus,
    /// Only set once the job has FAILED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Non-blank lines persisted; set on COMPLETED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_processed: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A freshly created job in PENDING
    pub fn new(object_key: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            object_key: object_key.into(),
            status: JobStatus::Pending,
            error: None,
            lines_processed: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Apply a status change in place, stamping the matching timestamp.
    ///
    /// Callers are expected to have checked `can_transition_to` first.
    pub fn apply(&mut self, transition: &Transition, at: DateTime<Utc>) {
        self.status = transition.to;
        match transition.to {
            JobStatus::Processing => self.started_at = Some(at),
            JobStatus::Completed => {
                self.lines_processed = transition.lines_processed;
                self.finished_at = Some(at);
            }
            JobStatus::Failed => {
                self.error = transition.error.clone();
                self.finished_at = Some(at);
            }
            JobStatus::Pending => {}
        }
    }
}

/// A requested status change for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub to: JobStatus,
    pub error: Option<String>,
    pub lines_processed: Option<i64>,
}

impl Transition {
    pub fn processing() -> Self {
        Self {
            to: JobStatus::Processing,
            error: None,
            lines_processed: None,
        }
    }

    pub fn completed(lines_processed: u64) -> Self {
        Self {
            to: JobStatus::Completed,
            error: None,
            lines_processed: Some(i64::try_from(lines_processed).unwrap_or(i64::MAX)),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            to: JobStatus::Failed,
            error: Some(error.into()),
            lines_processed: None,
        }
    }
}

/// One persisted line of an ingested object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub content: String,
    pub original_file: String,
}

/// Filter for job listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl JobFilter {
    pub fn new(status: Option<JobStatus>, limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            status,
            limit: limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for JobFilter {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}
