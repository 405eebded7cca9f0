use axum::{
    extract::{Json, State},
    http::HeaderMap,
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::handlers::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TurinvoiceCallback {
    pub order_id: String,
    pub status: Option<String>,
    /// Some portal versions send the shared secret in the body instead of
    /// the header
    pub secret: Option<String>,
}

/// Server-to-server payment callback from the TRY invoice provider,
/// validated by shared-secret equality
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/turinvoice",
    request_body = TurinvoiceCallback,
    responses(
        (status = 200, description = "Callback accepted"),
        (status = 401, description = "Invalid webhook secret", body = crate::errors::ErrorResponse),
        (status = 400, description = "Provider not configured", body = crate::errors::ErrorResponse)
    ),
    tag = "Webhooks"
)]
pub(crate) async fn turinvoice_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(callback): Json<TurinvoiceCallback>,
) -> Result<Json<Value>, ServiceError> {
    let client = state.services.turinvoice.as_ref().ok_or_else(|| {
        ServiceError::ValidationError("TRY invoice payments are not enabled".to_string())
    })?;

    let provided = headers
        .get("x-turinvoice-secret")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| callback.secret.clone())
        .unwrap_or_default();

    if !client.verify_webhook(&provided) {
        warn!(order_id = %callback.order_id, "turinvoice callback with invalid secret");
        return Err(ServiceError::Unauthorized(
            "invalid webhook secret".to_string(),
        ));
    }

    info!(
        order_id = %callback.order_id,
        status = callback.status.as_deref().unwrap_or("unknown"),
        "turinvoice callback received"
    );
    metrics::counter!("turinvoice_callbacks_total", 1);

    Ok(Json(json!({ "received": true })))
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/turinvoice", post(turinvoice_callback))
}
