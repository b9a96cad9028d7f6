//! Workspace lifecycle and local session transitions.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    routing::{get, post, put},
};
use cm_studio_core::{
    HistoryEntryId, HistorySummary, ImageAsset, MediaError, SessionSnapshot, WorkspaceId,
};
use serde::{Deserialize, Serialize};

use crate::capture::{ClipboardItem, capture_file, capture_paste};
use crate::error::AppError;
use crate::services::PromptUpdate;
use crate::state::AppState;

/// Header carrying the original file name for raw image uploads.
pub const FILE_NAME_HEADER: &str = "x-file-name";

/// Build the workspace router. Paths are relative to `/api/workspaces/{id}`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/image", post(set_image))
        .route("/paste", post(paste))
        .route("/reset", post(reset))
        .route("/prompt", put(update_prompt))
        .route("/history", get(history))
        .route("/history/{entry}/restore", post(restore))
}

/// Response for a newly created workspace.
#[derive(Debug, Serialize)]
pub struct CreatedWorkspace {
    pub id: WorkspaceId,
}

/// Whether a capture produced a new original image.
#[derive(Debug, Serialize)]
pub struct CaptureResponse {
    pub accepted: bool,
}

/// JSON form of an image upload.
#[derive(Debug, Deserialize)]
pub struct ImageBody {
    /// Data URL or bare base64.
    pub image: String,
}

/// Paste event payload.
#[derive(Debug, Deserialize)]
pub struct PasteBody {
    #[serde(default)]
    pub items: Vec<ClipboardItem>,
}

/// Create a workspace.
pub async fn create(State(state): State<AppState>) -> (StatusCode, Json<CreatedWorkspace>) {
    let workspace = state.workspaces().create().await;
    (
        StatusCode::CREATED,
        Json(CreatedWorkspace { id: workspace.id() }),
    )
}

/// Current session snapshot.
///
/// # Errors
///
/// Returns 404 for unknown workspaces.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let workspace = state.workspace(id).await?;
    Ok(Json(workspace.snapshot()))
}

/// Close a workspace, cancelling anything in flight.
///
/// # Errors
///
/// Returns 404 for unknown workspaces.
pub async fn close(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
) -> Result<StatusCode, AppError> {
    if state.workspaces().close(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("workspace {id}")))
    }
}

/// Set the original image.
///
/// Accepts either a JSON `{"image": "data:..."}` body or the raw file bytes
/// with their `Content-Type`. Non-image files are ignored.
///
/// # Errors
///
/// Returns 404 for unknown workspaces and 400 for a malformed JSON body or
/// payload.
pub async fn set_image(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CaptureResponse>, AppError> {
    let workspace = state.workspace(id).await?;
    let content_type = header_str(&headers, header::CONTENT_TYPE.as_str());

    let image = if content_type.is_some_and(|ct| ct.starts_with("application/json")) {
        let body: ImageBody = serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("invalid image body: {e}")))?;
        match ImageAsset::from_transport(&body.image) {
            Ok(image) => Some(image),
            Err(MediaError::UnsupportedType(mime)) => {
                tracing::debug!(%mime, "Ignoring non-image selection");
                None
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        let mime = content_type.map(|ct| ct.split(';').next().unwrap_or(ct));
        capture_file(header_str(&headers, FILE_NAME_HEADER), mime, body.to_vec())
    };

    let accepted = image.is_some();
    if let Some(image) = image {
        state.studio().set_original(&workspace, image);
    }
    Ok(Json(CaptureResponse { accepted }))
}

/// Paste clipboard items. The first image item becomes the original.
///
/// # Errors
///
/// Returns 404 for unknown workspaces.
pub async fn paste(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
    Json(body): Json<PasteBody>,
) -> Result<Json<CaptureResponse>, AppError> {
    let workspace = state.workspace(id).await?;
    let image = capture_paste(&body.items);
    let accepted = image.is_some();
    if let Some(image) = image {
        state.studio().set_original(&workspace, image);
    }
    Ok(Json(CaptureResponse { accepted }))
}

/// Clear the working state, keeping history.
///
/// # Errors
///
/// Returns 404 for unknown workspaces.
pub async fn reset(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let workspace = state.workspace(id).await?;
    state.studio().reset(&workspace);
    Ok(Json(workspace.snapshot()))
}

/// Update the prompt, preset or aspect ratio.
///
/// # Errors
///
/// Returns 404 for unknown workspaces and 400 for unknown presets.
pub async fn update_prompt(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
    Json(update): Json<PromptUpdate>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let workspace = state.workspace(id).await?;
    state.studio().update_prompt(&workspace, update)?;
    Ok(Json(workspace.snapshot()))
}

/// Edit history, newest first.
///
/// # Errors
///
/// Returns 404 for unknown workspaces.
pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
) -> Result<Json<Vec<HistorySummary>>, AppError> {
    let workspace = state.workspace(id).await?;
    Ok(Json(workspace.snapshot().history))
}

/// Make a past edit the active state.
///
/// # Errors
///
/// Returns 404 for unknown workspaces or entries.
pub async fn restore(
    State(state): State<AppState>,
    Path((id, entry)): Path<(WorkspaceId, HistoryEntryId)>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let workspace = state.workspace(id).await?;
    state.studio().restore(&workspace, entry)?;
    Ok(Json(workspace.snapshot()))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
