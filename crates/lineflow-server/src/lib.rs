//! Lineflow Server Library
//!
//! HTTP server that ingests uploaded text files line by line.
//!
//! # Overview
//!
//! - **API Endpoints**: upload a file, queue it for processing, poll the job
//! - **Ingestion Pipeline**: streams each object from storage and writes one
//!   record per non-blank line in pages of 1000
//! - **Database Management**: PostgreSQL integration with SQLx
//! - **Storage Backend**: S3-compatible object storage
//! - **Configuration**: Environment-based configuration management
//!
//! # Architecture
//!
//! Requests only create jobs. A single background dispatcher per process
//! drains PENDING jobs in creation order, one at a time:
//!
//! ```text
//! POST /process/:key -> JobRepository::create -> Dispatcher::notify_job_created
//!                                                     |
//!        IngestionWorker <- Dispatcher::run (single flight) <-+
//!          claim -> PROCESSING -> LineReader -> BatchAccumulator -> COMPLETED / FAILED
//! ```
//!
//! # Example
//!
//! ```no_run
//! use lineflow_server::ingest::memory::{MemoryJobStore, MemoryObjectStore, MemoryRecordStore};
//! use lineflow_server::ingest::{Dispatcher, IngestionWorker, JobRepository, WorkerConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let jobs = Arc::new(MemoryJobStore::new());
//!     let objects = Arc::new(MemoryObjectStore::new());
//!     objects.insert("a.txt", "hello\nworld\n").await;
//!
//!     let worker = IngestionWorker::new(
//!         jobs.clone(),
//!         Arc::new(MemoryRecordStore::new()),
//!         objects,
//!         WorkerConfig::default(),
//!     );
//!     let dispatcher = Dispatcher::new(worker, Duration::from_secs(30));
//!
//!     jobs.create("a.txt").await?;
//!     dispatcher.run().await;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;
pub mod storage;

// Re-export commonly used types
pub use error::AppError;
