use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    Client,
};
use tracing::{debug, info, instrument};

use crate::ingest::{IngestError, IngestResult, ObjectStore, ObjectStream};

pub mod config;

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn new(config: config::StorageConfig) -> Result<Self> {
        debug!(
            endpoint = ?config.endpoint,
            region = %config.region,
            bucket = %config.bucket,
            path_style = config.path_style,
            "Initializing storage"
        );

        let client = Client::from_conf(s3_client_config(&config));

        info!("Storage client initialized for bucket: {}", config.bucket);

        Ok(Self {
            client,
            bucket: config.bucket,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Create the bucket unless it already exists
    #[instrument(skip(self))]
    pub async fn ensure_bucket(&self) -> Result<()> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            return Ok(());
        }

        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{}", DisplayErrorContext(&e)))
            .with_context(|| format!("Failed to create bucket {}", self.bucket))?;

        info!("Created bucket {}", self.bucket);
        Ok(())
    }

    #[instrument(skip(self, data))]
    pub async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<UploadResult> {
        let size = data.len() as i64;

        debug!(bytes = size, bucket = %self.bucket, "Putting object");

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{}", DisplayErrorContext(&e)))
            .context("Failed to upload to S3")?;

        info!(bytes = size, bucket = %self.bucket, "Object stored");

        Ok(UploadResult {
            key: key.to_string(),
            size,
        })
    }
}

#[async_trait]
impl ObjectStore for Storage {
    #[instrument(skip(self))]
    async fn open_read_stream(&self, key: &str) -> IngestResult<ObjectStream> {
        debug!("Opening s3://{}/{}", self.bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    IngestError::ObjectNotFound(key.to_string())
                } else {
                    IngestError::Transfer(DisplayErrorContext(&e).to_string())
                }
            })?;

        Ok(Box::new(Box::pin(response.body.into_async_read())))
    }

    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> IngestResult<()> {
        self.upload(key, data, content_type)
            .await
            .map(|_| ())
            .map_err(|e| IngestError::Transfer(format!("{:#}", e)))
    }
}

/// Static credentials plus an optional custom endpoint (MinIO, LocalStack)
fn s3_client_config(config: &config::StorageConfig) -> aws_sdk_s3::Config {
    let builder = aws_sdk_s3::Config::builder()
        .credentials_provider(Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "lineflow-storage",
        ))
        .region(Region::new(config.region.clone()))
        .force_path_style(config.path_style);

    match &config.endpoint {
        Some(endpoint) => builder.endpoint_url(endpoint).build(),
        None => builder.build(),
    }
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub key: String,
    pub size: i64,
}

/// Key for a freshly uploaded file: `{unix_millis}-{file name}`.
///
/// Any directory part of `filename` is dropped so the key stays a single
/// path segment.
pub fn build_upload_key(filename: &str, unix_millis: i64) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("upload");
    format!("{}-{}", unix_millis, name)
}
