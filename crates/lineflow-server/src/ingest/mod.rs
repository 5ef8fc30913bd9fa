//! Line ingestion pipeline
//!
//! Turns uploaded text objects into one record per non-blank line.
//!
//! # Architecture
//!
//! - **job_store**: ingestion jobs and their PENDING -> PROCESSING -> COMPLETED/FAILED lifecycle
//! - **object_store**: sequential read access to stored objects
//! - **reader**: bounded-memory line framing over an object stream
//! - **batch**: pages of 1000 records written with one bulk insert each
//! - **record_store**: persisted line records
//! - **worker**: claims and runs exactly one job
//! - **dispatcher**: single-flight loop that drains the queue, woken on job creation
//! - **memory**: in-process backends for tests and local runs
//!
//! Jobs are processed one at a time per process, oldest first. A job that
//! fails is marked FAILED and the dispatcher moves on to the next one; failed
//! jobs are never retried automatically.

pub mod batch;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod job_store;
pub mod memory;
pub mod object_store;
pub mod reader;
pub mod record_store;
pub mod types;
pub mod worker;

pub use batch::{BatchAccumulator, PAGE_SIZE};
pub use config::IngestConfig;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{IngestError, IngestResult};
pub use job_store::{JobRepository, PgJobStore};
pub use object_store::{ObjectStore, ObjectStream};
pub use reader::LineReader;
pub use record_store::{PgRecordStore, RecordRepository};
pub use types::{Job, JobFilter, JobStatus, Record, Transition};
pub use worker::{IngestionWorker, RunOutcome, WorkerConfig, WorkerPhase};
