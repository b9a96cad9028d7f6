//! Static catalog endpoints: presets and the staff roster.

use axum::{Json, Router, extract::State, routing::get};
use cm_studio_core::{Preset, StaffMember, builtin_presets};

use crate::state::AppState;

/// Build the catalog router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/presets", get(presets))
        .route("/api/staff", get(roster))
}

/// List the built-in presets.
pub async fn presets() -> Json<&'static [Preset]> {
    Json(builtin_presets())
}

/// List the staff members who can sign in.
pub async fn roster(State(state): State<AppState>) -> Json<Vec<StaffMember>> {
    Json(state.sales().roster().members().to_vec())
}
