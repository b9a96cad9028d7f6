//! HTTP route handlers for the studio.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                                  - Health check
//!
//! # Catalog
//! GET    /api/presets                             - Built-in edit presets
//! GET    /api/staff                               - Staff roster
//!
//! # Workspaces
//! POST   /api/workspaces                          - Create a workspace
//! GET    /api/workspaces/{id}                     - Session snapshot
//! DELETE /api/workspaces/{id}                     - Close (cancels pending calls)
//! POST   /api/workspaces/{id}/image               - Set the original image
//! POST   /api/workspaces/{id}/paste               - Paste clipboard items
//! POST   /api/workspaces/{id}/reset               - Clear working state
//! PUT    /api/workspaces/{id}/prompt              - Prompt, preset and aspect ratio
//! GET    /api/workspaces/{id}/history             - Edit history
//! POST   /api/workspaces/{id}/history/{entry}/restore - Restore a past edit
//!
//! # Remote operations
//! POST   /api/workspaces/{id}/edit                - Apply the edit
//! POST   /api/workspaces/{id}/transcribe          - Dictate into the prompt
//! POST   /api/workspaces/{id}/caption             - Generate a caption
//! POST   /api/workspaces/{id}/abort/{operation}   - Cancel an in-flight call
//!
//! # Export
//! GET    /api/workspaces/{id}/processed           - Download the processed image
//! POST   /api/workspaces/{id}/upload              - Upload to Drive (Bearer token)
//!
//! # Staff and sales
//! POST   /api/workspaces/{id}/staff               - Sign in
//! DELETE /api/workspaces/{id}/staff               - Sign out
//! POST   /api/workspaces/{id}/sales/preview       - Sale figures
//! POST   /api/workspaces/{id}/sales               - Record a sale
//! ```

pub mod catalog;
pub mod operations;
pub mod sales;
pub mod staff;
pub mod storage;
pub mod workspaces;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::state::AppState;

/// Routes scoped to one workspace.
fn workspace_routes() -> Router<AppState> {
    Router::new()
        .merge(workspaces::router())
        .merge(operations::router())
        .merge(staff::router())
        .merge(sales::router())
        .merge(storage::router())
}

/// Build the API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(catalog::router())
        .route("/api/workspaces", post(workspaces::create))
        .route(
            "/api/workspaces/{id}",
            get(workspaces::show).delete(workspaces::close),
        )
        .nest("/api/workspaces/{id}", workspace_routes())
}

/// Build the complete application with state and the upload size limit.
pub fn app(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(routes())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}
