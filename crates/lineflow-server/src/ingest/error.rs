//! Error taxonomy for the ingestion pipeline

use thiserror::Error;
use uuid::Uuid;

use super::types::JobStatus;

pub type IngestResult<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// The object key does not exist in blob storage
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Network or stream fault while talking to blob storage
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// Job or record store unreachable, or a write was rejected
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Line exceeds the maximum length of {limit} bytes")]
    LineTooLong { limit: usize },
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        IngestError::Persistence(err.to_string())
    }
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Transfer(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_are_transfer_errors() {
        let err: IngestError =
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer reset").into();
        assert!(matches!(err, IngestError::Transfer(ref msg) if msg.contains("peer reset")));
    }

    #[test]
    fn test_invalid_transition_message() {
        let job_id = Uuid::nil();
        let err = IngestError::InvalidTransition {
            job_id,
            from: JobStatus::Completed,
            to: JobStatus::Processing,
        };
        assert_eq!(
            err.to_string(),
            format!("Job {} cannot move from COMPLETED to PROCESSING", job_id)
        );
    }
}
