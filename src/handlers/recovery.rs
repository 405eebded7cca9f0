use axum::{
    extract::{Json, State},
    routing::get,
    Router,
};
use serde_json::{json, Value};

use crate::errors::ServiceError;
use crate::handlers::AppState;

/// Scheduler-triggered abandoned-booking sweep
#[utoipa::path(
    get,
    path = "/api/v1/recovery/abandoned",
    responses(
        (status = 200, description = "Sweep result with per-draft outcomes"),
        (status = 503, description = "Database unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Recovery"
)]
pub(crate) async fn run_abandoned_sweep(
    State(state): State<AppState>,
) -> Result<Json<Value>, ServiceError> {
    let processed = state.services.recovery.run_sweep().await?;

    if processed.is_empty() {
        return Ok(Json(json!({ "message": "No abandoned drafts found" })));
    }

    Ok(Json(json!({
        "success": true,
        "processed": processed,
    })))
}

pub fn recovery_routes() -> Router<AppState> {
    Router::new().route("/abandoned", get(run_abandoned_sweep))
}
