//! Export endpoints: download and cloud upload.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use cm_studio_core::WorkspaceId;
use secrecy::SecretString;
use serde::Deserialize;

use crate::drive::StoredFile;
use crate::error::AppError;
use crate::state::AppState;

/// Build the storage router. Paths are relative to `/api/workspaces/{id}`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/processed", get(download))
        .route("/upload", post(upload))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadRequest {
    /// Defaults to `CM_Studio_YYYYMMDD.<ext>`.
    pub file_name: Option<String>,
}

/// Download the processed image as an attachment.
///
/// # Errors
///
/// Returns 404 if nothing has been processed yet.
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
) -> Result<Response, AppError> {
    let workspace = state.workspace(id).await?;
    let download = state
        .studio()
        .download(&workspace, Utc::now().date_naive())
        .ok_or_else(|| AppError::NotFound("processed image".to_string()))?;

    let content_type = HeaderValue::from_str(download.image.mime_type())
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        download.file_name
    ))
    .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.image.into_bytes(),
    )
        .into_response())
}

/// Upload the current image to Drive with the caller's OAuth token.
///
/// # Errors
///
/// Returns 401 without a bearer token, 400 without an image, 403 if Drive
/// refuses the token, or 502 for other upstream failures.
pub async fn upload(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
    headers: HeaderMap,
    body: Option<Json<UploadRequest>>,
) -> Result<Json<StoredFile>, AppError> {
    let workspace = state.workspace(id).await?;
    let file_name = body.and_then(|Json(body)| body.file_name);
    let stored = state
        .studio()
        .upload(&workspace, file_name, bearer_token(&headers))
        .await?;
    Ok(Json(stored))
}

/// Extract the token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<SecretString> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| SecretString::from(token.to_string()))
}
