//! Remote operation endpoints: edit, transcription, caption and abort.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use cm_studio_core::{AudioClip, Operation, WorkspaceId};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::services::{EditOutcome, TranscriptOutcome};
use crate::state::AppState;

/// Build the operations router. Paths are relative to `/api/workspaces/{id}`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/edit", post(apply_edit))
        .route("/transcribe", post(transcribe))
        .route("/caption", post(generate_caption))
        .route("/abort/{operation}", post(abort))
}

/// Dictated audio.
#[derive(Debug, Deserialize)]
pub struct TranscribeBody {
    /// Data URL or bare base64 (assumed `audio/webm`).
    pub audio: AudioClip,
}

/// Optional creative direction for a caption.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CaptionBody {
    pub idea: String,
}

#[derive(Debug, Serialize)]
pub struct CaptionResponse {
    pub caption: String,
}

#[derive(Debug, Serialize)]
pub struct AbortResponse {
    pub operation: Operation,
    pub aborted: bool,
}

/// Edit the original image with the current prompt and framing.
///
/// # Errors
///
/// Returns 400 if the image or prompt is missing, 409 if an edit is already
/// running, or the remote failure.
pub async fn apply_edit(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
) -> Result<Json<EditOutcome>, AppError> {
    let workspace = state.workspace(id).await?;
    let outcome = state.studio().apply_edit(&workspace).await?;
    Ok(Json(outcome))
}

/// Transcribe dictated audio into the prompt.
///
/// # Errors
///
/// Returns 409 if a transcription is already running, or the remote failure.
pub async fn transcribe(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
    Json(body): Json<TranscribeBody>,
) -> Result<Json<TranscriptOutcome>, AppError> {
    let workspace = state.workspace(id).await?;
    let outcome = state.studio().transcribe(&workspace, body.audio).await?;
    Ok(Json(outcome))
}

/// Write a caption for the current image.
///
/// # Errors
///
/// Returns 400 without an image, 409 if a caption is already being written,
/// or the remote failure.
pub async fn generate_caption(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
    body: Option<Json<CaptionBody>>,
) -> Result<Json<CaptionResponse>, AppError> {
    let workspace = state.workspace(id).await?;
    let idea = body.map(|Json(body)| body.idea).unwrap_or_default();
    let caption = state.studio().generate_caption(&workspace, &idea).await?;
    Ok(Json(CaptionResponse { caption }))
}

/// Cancel an in-flight operation.
///
/// # Errors
///
/// Returns 404 for unknown workspaces.
pub async fn abort(
    State(state): State<AppState>,
    Path((id, operation)): Path<(WorkspaceId, Operation)>,
) -> Result<Json<AbortResponse>, AppError> {
    let workspace = state.workspace(id).await?;
    let aborted = state.studio().abort(&workspace, operation);
    Ok(Json(AbortResponse { operation, aborted }))
}
