//! Jobs feature module
//!
//! Creates ingestion jobs for stored objects and exposes their status.
//! Creating a job wakes the dispatcher; processing happens in the
//! background and is observed by polling the job.

pub mod commands;
pub mod queries;
pub mod routes;


pub use commands::{CreateJobCommand, CreateJobError, CreateJobResponse};
pub use queries::{GetJobError, GetJobQuery, ListJobsError, ListJobsQuery, ListJobsResponse};
pub use routes::jobs_routes;
