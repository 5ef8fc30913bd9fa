//! Blob storage seam
//!
//! The pipeline only ever needs two things from blob storage: put an object
//! and open one for sequential reading. `crate::storage::Storage` implements
//! this against S3; `super::memory::MemoryObjectStore` keeps objects in RAM.

use async_trait::async_trait;
use tokio::io::AsyncRead;

use super::error::IngestResult;

/// A sequential byte stream over one stored object
pub type ObjectStream = Box<dyn AsyncRead + Send + Unpin>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open `key` for a single forward pass.
    ///
    /// Fails with `ObjectNotFound` when the key does not exist and with
    /// `Transfer` for connectivity faults.
    async fn open_read_stream(&self, key: &str) -> IngestResult<ObjectStream>;

    /// Store `data` under `key`, replacing any existing object.
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> IngestResult<()>;
}
