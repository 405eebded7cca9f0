use axum::{
    extract::{Json, State},
    routing::get,
    Router,
};
use sea_orm::{ConnectionTrait, Statement};
use serde_json::{json, Value};

use crate::handlers::AppState;

/// Liveness/readiness probe; reports database reachability without failing
/// the endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service health")),
    tag = "Health"
)]
pub(crate) async fn health(State(state): State<AppState>) -> Json<Value> {
    let db_ok = state
        .db
        .execute(Statement::from_string(
            state.db.get_database_backend(),
            "SELECT 1".to_string(),
        ))
        .await
        .is_ok();

    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "database": if db_ok { "up" } else { "down" },
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
