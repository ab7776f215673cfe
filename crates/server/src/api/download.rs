//! Artifact download endpoint.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
pub struct DownloadErrorResponse {
    pub error: String,
}

/// GET /api/download/{filename}
///
/// Serves an encoded artifact from the output directory. Only bare
/// filenames are accepted; anything that could escape the directory
/// is rejected.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Response {
    if !is_safe_filename(&filename) {
        return (
            StatusCode::BAD_REQUEST,
            Json(DownloadErrorResponse {
                error: "Invalid filename".to_string(),
            }),
        )
            .into_response();
    }

    let path = state.config().encoder.output_dir.join(&filename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (
                StatusCode::NOT_FOUND,
                Json(DownloadErrorResponse {
                    error: "File not found".to_string(),
                }),
            )
                .into_response()
        }
    };

    (
        [
            (header::CONTENT_TYPE, content_type(&filename).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains("..")
        && !filename.starts_with('.')
}

fn content_type(filename: &str) -> &'static str {
    match filename.rsplit('.').next() {
        Some("gif") => "image/gif",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}
