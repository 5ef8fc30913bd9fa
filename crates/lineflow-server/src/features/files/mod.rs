//! Files feature module
//!
//! Accepts multipart uploads and stores them in blob storage under a
//! timestamped key. The returned key is what `POST /process/:object_key`
//! expects.

pub mod commands;
pub mod routes;

pub use commands::{UploadFileCommand, UploadFileError, UploadFileResponse};

pub use routes::files_routes;
