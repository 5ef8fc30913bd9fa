use crate::api::response::ApiResponse;
use crate::error::AppError;
use crate::features::FeatureState;
use axum::{
    extract::{Multipart, State},
    routing::post,
    Router,
};

use super::commands::{upload, UploadFileCommand, UploadFileError, UploadFileResponse};

pub fn files_routes() -> Router<FeatureState> {
    Router::new().route("/upload", post(upload_file))
}

/// POST /upload (multipart field `file`)
#[tracing::instrument(skip(state, multipart))]
async fn upload_file(
    State(state): State<FeatureState>,
    mut multipart: Multipart,
) -> Result<ApiResponse<UploadFileResponse>, AppError> {
    let mut command: Option<UploadFileCommand> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("").to_string();
        let content_type = field.content_type().map(|s| s.to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file bytes: {}", e)))?;

        command = Some(UploadFileCommand {
            filename,
            content: data.to_vec(),
            content_type,
        });
    }

    let command = command.ok_or(UploadFileError::FileRequired)?;
    let now = chrono::Utc::now().timestamp_millis();

    let response = upload::handle(state.objects.as_ref(), command, now).await?;

    tracing::info!(
        key = %response.file_name,
        size = response.size,
        "File uploaded via API"
    );

    Ok(ApiResponse::created(response))
}
