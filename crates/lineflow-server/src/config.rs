//! Process configuration
//!
//! Everything is read from the environment (after loading `.env` if one is
//! present). Unset variables fall back to the defaults below; set but
//! unparsable values are startup errors.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::ingest::IngestConfig;

pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 3000;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// 100 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/lineflow";
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Vite dev server
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:5173";

/// Read `name` and parse it, or return `default` when it is unset
pub(crate) fn env_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid value for {}: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    /// Request body cap, applies to multipart uploads
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Empty or containing `*` means any origin
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// `LINEFLOW_HOST`, `LINEFLOW_PORT`, `LINEFLOW_SHUTDOWN_TIMEOUT`,
    /// `LINEFLOW_MAX_UPLOAD_BYTES`
    fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: env_or("LINEFLOW_HOST", defaults.host)?,
            port: env_or("LINEFLOW_PORT", defaults.port)?,
            shutdown_timeout_secs: env_or(
                "LINEFLOW_SHUTDOWN_TIMEOUT",
                defaults.shutdown_timeout_secs,
            )?,
            max_upload_bytes: env_or("LINEFLOW_MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
        })
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
        }
    }
}

impl DatabaseConfig {
    /// `DATABASE_URL` and `DATABASE_*` pool settings
    fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            url: env_or("DATABASE_URL", defaults.url)?,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: env_or("DATABASE_MIN_CONNECTIONS", defaults.min_connections)?,
            connect_timeout_secs: env_or(
                "DATABASE_CONNECT_TIMEOUT",
                defaults.connect_timeout_secs,
            )?,
            idle_timeout_secs: env_or("DATABASE_IDLE_TIMEOUT", defaults.idle_timeout_secs)?,
        })
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
            allow_credentials: false,
        }
    }
}

impl CorsConfig {
    /// `CORS_ALLOWED_ORIGINS` (comma separated) and `CORS_ALLOW_CREDENTIALS`
    fn from_env() -> anyhow::Result<Self> {
        let origins: String =
            env_or("CORS_ALLOWED_ORIGINS", DEFAULT_CORS_ALLOWED_ORIGIN.to_string())?;
        Ok(Self {
            allowed_origins: origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            allow_credentials: env_or("CORS_ALLOW_CREDENTIALS", false)?,
        })
    }
}

impl Config {
    /// Load `.env`, read every section from the environment and validate
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            cors: CorsConfig::from_env()?,
            ingest: IngestConfig::from_env()?,
        };
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("LINEFLOW_PORT must be greater than 0");
        }
        if self.server.max_upload_bytes == 0 {
            anyhow::bail!("LINEFLOW_MAX_UPLOAD_BYTES must be greater than 0");
        }
        if self.database.url.trim().is_empty() {
            anyhow::bail!("DATABASE_URL cannot be empty");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be greater than 0");
        }
        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "DATABASE_MIN_CONNECTIONS ({}) exceeds DATABASE_MAX_CONNECTIONS ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }
        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured, allowing any origin");
        }

        self.ingest.validate()
    }
}
