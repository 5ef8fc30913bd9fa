//! Ingestion configuration
//!
//! Settings for the background dispatcher and the object reader, loaded from
//! `INGEST_*` environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::dispatcher::DEFAULT_POLL_INTERVAL;
use super::reader::DEFAULT_MAX_LINE_BYTES;
use super::worker::WorkerConfig;
use crate::config::env_or;

const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    /// Whether the background dispatcher runs in this process
    pub enabled: bool,
    /// Seconds between background polls for PENDING jobs
    pub poll_interval_secs: u64,
    /// Per-read stall timeout in seconds (0 = no timeout)
    pub read_timeout_secs: u64,
    /// Longest accepted line, in bytes
    pub max_line_bytes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl IngestConfig {
    /// `INGEST_ENABLED`, `INGEST_POLL_INTERVAL_SECS`,
    /// `INGEST_READ_TIMEOUT_SECS`, `INGEST_MAX_LINE_BYTES`
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let config = Self {
            enabled: env_or("INGEST_ENABLED", defaults.enabled)?,
            poll_interval_secs: env_or("INGEST_POLL_INTERVAL_SECS", defaults.poll_interval_secs)?,
            read_timeout_secs: env_or("INGEST_READ_TIMEOUT_SECS", defaults.read_timeout_secs)?,
            max_line_bytes: env_or("INGEST_MAX_LINE_BYTES", defaults.max_line_bytes)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("INGEST_POLL_INTERVAL_SECS must be greater than 0");
        }
        if self.max_line_bytes == 0 {
            anyhow::bail!("INGEST_MAX_LINE_BYTES must be greater than 0");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// `None` when the timeout is disabled
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0).then(|| Duration::from_secs(self.read_timeout_secs))
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            read_timeout: self.read_timeout(),
            max_line_bytes: self.max_line_bytes,
        }
    }
}
