//! Staff sign-in for a workspace.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use cm_studio_core::{StaffMember, WorkspaceId};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

/// Build the staff router. Paths are relative to `/api/workspaces/{id}`.
pub fn router() -> Router<AppState> {
    Router::new().route("/staff", post(sign_in).delete(sign_out))
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub name: String,
}

/// Sign a roster member in.
///
/// # Errors
///
/// Returns 400 for names not on the roster.
pub async fn sign_in(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
    Json(body): Json<SignInRequest>,
) -> Result<Json<StaffMember>, AppError> {
    let workspace = state.workspace(id).await?;
    let member = state.sales().sign_in(&workspace, &body.name)?;
    Ok(Json(member))
}

/// Sign out whoever is signed in.
///
/// # Errors
///
/// Returns 404 for unknown workspaces.
pub async fn sign_out(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
) -> Result<StatusCode, AppError> {
    let workspace = state.workspace(id).await?;
    if let Some(member) = state.sales().sign_out(&workspace) {
        tracing::info!(workspace_id = %id, staff = %member.name, "Staff signed out");
    }
    Ok(StatusCode::NO_CONTENT)
}
