//! HTTP error mapping
//!
//! Pipeline errors keep their meaning at the API edge: missing things are
//! 404, illegal job state changes 409. Store and storage failures are logged
//! and reported with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ingest::IngestError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Malformed input rejected before it reaches the pipeline
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Ingest(e) => match e {
                IngestError::JobNotFound(_) | IngestError::ObjectNotFound(_) => {
                    (StatusCode::NOT_FOUND, e.to_string())
                },
                IngestError::InvalidTransition { .. } => (StatusCode::CONFLICT, e.to_string()),
                IngestError::Persistence(_) | IngestError::LineTooLong { .. } => {
                    tracing::error!("Internal error: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "An internal error occurred".to_string(),
                    )
                },
                IngestError::Transfer(_) => {
                    tracing::error!("Storage error: {}", e);
                    (StatusCode::BAD_GATEWAY, "A storage error occurred".to_string())
                },
            },
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        let body = Json(json!({
            "error": {
                "message": error_message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}
