//! Job routes
//!
//! `POST /process/:object_key` queues an uploaded object for ingestion;
//! `GET /jobs` and `GET /jobs/:job_id` report progress.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Router,
};

use super::commands::{create::handle as handle_create_job, CreateJobCommand, CreateJobResponse};
use super::queries::{
    get_job::handle as handle_get_job, list_jobs::handle as handle_list_jobs, GetJobQuery,
    ListJobsQuery,
};
use crate::api::response::{ApiResponse, PageMeta};
use crate::error::AppError;
use crate::features::FeatureState;
use crate::ingest::Job;

/// Create job routes
pub fn jobs_routes() -> Router<FeatureState> {
    Router::new()
        .route("/process/:object_key", post(create_job))
        .route("/jobs", get(list_jobs))
        .route("/jobs/:job_id", get(get_job))
}

/// Queue an uploaded object for ingestion
///
/// POST /process/:object_key
async fn create_job(
    State(state): State<FeatureState>,
    Path(object_key): Path<String>,
) -> Result<ApiResponse<CreateJobResponse>, AppError> {
    let command = CreateJobCommand { object_key };
    let response = handle_create_job(state.jobs.as_ref(), &state.dispatcher, command).await?;

    Ok(ApiResponse::created(response))
}

/// List jobs
///
/// GET /jobs?status=FAILED&limit=50&offset=0
async fn list_jobs(
    State(state): State<FeatureState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<ApiResponse<Vec<Job>>, AppError> {
    let response = handle_list_jobs(state.jobs.as_ref(), query).await?;
    let meta = PageMeta {
        limit: response.limit,
        offset: response.offset,
        count: response.jobs.len(),
    };

    Ok(ApiResponse::ok(response.jobs).with_meta(meta))
}

/// Get a specific job by ID
///
/// GET /jobs/:job_id
async fn get_job(
    State(state): State<FeatureState>,
    Path(job_id): Path<String>,
) -> Result<ApiResponse<Job>, AppError> {
    let job = handle_get_job(state.jobs.as_ref(), GetJobQuery { job_id }).await?;

    Ok(ApiResponse::ok(job))
}
