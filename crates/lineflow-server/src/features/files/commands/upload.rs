use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::ingest::{IngestError, ObjectStore};
use crate::storage::build_upload_key;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFileCommand {
    pub filename: String,
    #[serde(skip)]
    pub content: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileResponse {
    pub message: String,
    /// Object key the file was stored under
    pub file_name: String,
    pub size: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadFileError {
    #[error("No file uploaded")]
    FileRequired,
    #[error("Filename is required and cannot be empty")]
    FilenameRequired,
    #[error("Filename must not exceed 255 characters")]
    FilenameLength,
    #[error("Storage error: {0}")]
    Storage(#[from] IngestError),
}

impl From<UploadFileError> for AppError {
    fn from(err: UploadFileError) -> Self {
        match err {
            UploadFileError::Storage(e) => AppError::Ingest(e),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl UploadFileCommand {
    pub fn validate(&self) -> Result<(), UploadFileError> {
        if self.filename.trim().is_empty() {
            return Err(UploadFileError::FilenameRequired);
        }
        if self.filename.len() > 255 {
            return Err(UploadFileError::FilenameLength);
        }
        Ok(())
    }
}

#[tracing::instrument(skip(objects, command), fields(filename = %command.filename))]
pub async fn handle(
    objects: &dyn ObjectStore,
    command: UploadFileCommand,
    unix_millis: i64,
) -> Result<UploadFileResponse, UploadFileError> {
    command.validate()?;

    let key = build_upload_key(&command.filename, unix_millis);
    let size = command.content.len();

    objects
        .put_object(&key, command.content, command.content_type)
        .await?;

    Ok(UploadFileResponse {
        message: "File uploaded successfully".to_string(),
        file_name: key,
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::memory::MemoryObjectStore;

    fn command(filename: &str, content: &[u8]) -> UploadFileCommand {
        UploadFileCommand {
            filename: filename.to_string(),
            content: content.to_vec(),
            content_type: Some("text/plain".to_string()),
        }
    }

    #[test]
    fn test_validation_success() {
        assert!(command("data.txt", b"a\nb\n").validate().is_ok());
    }

    #[test]
    fn test_validation_empty_filename() {
        assert!(matches!(
            command("  ", b"x").validate(),
            Err(UploadFileError::FilenameRequired)
        ));
    }

    #[test]
    fn test_validation_filename_too_long() {
        let long_name = "a".repeat(256);
        assert!(matches!(
            command(&long_name, b"x").validate(),
            Err(UploadFileError::FilenameLength)
        ));
    }

    #[tokio::test]
    async fn test_handle_stores_under_timestamped_key() {
        let objects = MemoryObjectStore::new();

        let response = handle(&objects, command("data.txt", b"one\ntwo\n"), 1234)
            .await
            .unwrap();

        assert_eq!(response.file_name, "1234-data.txt");
        assert_eq!(response.size, 8);
        assert_eq!(
            objects.get("1234-data.txt").await.as_deref(),
            Some(&b"one\ntwo\n"[..])
        );
    }

    #[test]
    fn test_response_serializes_camel_case() {
        let response = UploadFileResponse {
            message: "File uploaded successfully".to_string(),
            file_name: "1-a.txt".to_string(),
            size: 3,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["fileName"], "1-a.txt");
    }
}
