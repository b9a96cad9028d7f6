//! Sale recording.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use cm_studio_core::{SaleInput, WorkspaceId};

use crate::error::AppError;
use crate::services::{SalePreview, SaleReceipt};
use crate::state::AppState;

/// Build the sales router. Paths are relative to `/api/workspaces/{id}`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sales", post(record_sale))
        .route("/sales/preview", post(preview_sale))
}

/// Compute subtotal, total and profit for a sale form.
///
/// # Errors
///
/// Returns 404 for unknown workspaces.
pub async fn preview_sale(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
    Json(input): Json<SaleInput>,
) -> Result<Json<SalePreview>, AppError> {
    // Only checks the workspace exists; previews don't touch the session.
    state.workspace(id).await?;
    Ok(Json(state.sales().preview_sale(&input)))
}

/// Append a sale to the ledger as the signed-in staff member.
///
/// # Errors
///
/// Returns 401 without a signed-in member, 400 for invalid figures, 503
/// when no ledger is configured, or 502 if the ledger rejects the row.
pub async fn record_sale(
    State(state): State<AppState>,
    Path(id): Path<WorkspaceId>,
    Json(input): Json<SaleInput>,
) -> Result<(StatusCode, Json<SaleReceipt>), AppError> {
    let workspace = state.workspace(id).await?;
    let receipt = state.sales().record_sale(&workspace, input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
