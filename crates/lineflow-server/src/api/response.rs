//! Success envelope for the Lineflow API
//!
//! Every successful handler returns `{"success": true, "data": ..., "meta": ...}`.
//! Errors are rendered by [`crate::error::AppError`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip)]
    status: StatusCode,
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// Paging information attached to list responses
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PageMeta {
    pub limit: i64,
    pub offset: i64,
    pub count: usize,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 OK
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            data,
            meta: None,
        }
    }

    /// 201 Created
    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(data)
        }
    }

    pub fn with_meta(mut self, meta: impl Serialize) -> Self {
        // Plain structs always serialize; a failure would only drop the meta block
        self.meta = serde_json::to_value(meta).ok();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
