//! Feature modules implementing the Lineflow API
//!
//! Each feature is a vertical slice with its own commands, queries and
//! routes.
//!
//! # Features
//!
//! - **files**: multipart upload into blob storage
//! - **jobs**: ingestion job creation and status tracking
//!
//! # Architecture
//!
//! Each feature module follows the structure:
//! - `commands/` - Write operations
//! - `queries/` - Read operations
//! - `routes.rs` - HTTP route definitions
//!
//! Handlers work against the `JobRepository` and `ObjectStore` traits, so
//! the same routes run over Postgres/S3 in production and over the memory
//! backends in tests.

pub mod files;
pub mod jobs;

use axum::Router;
use std::sync::Arc;

use crate::ingest::{Dispatcher, JobRepository, ObjectStore};

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Ingestion job store
    pub jobs: Arc<dyn JobRepository>,
    /// Blob storage for uploads
    pub objects: Arc<dyn ObjectStore>,
    /// Woken whenever a job is created
    pub dispatcher: Dispatcher,
}

/// Creates the main API router with all feature routes mounted
///
/// - `POST /upload` - File upload
/// - `POST /process/:object_key` - Queue an uploaded file for ingestion
/// - `GET /jobs`, `GET /jobs/:job_id` - Job status
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .merge(files::files_routes())
        .merge(jobs::jobs_routes())
        .with_state(state)
}
