use axum::{
    extract::{Json, Path, State},
    routing::{get, patch},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::{booking, BookingStatus};
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::ApiResponse;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({ "status": "completed", "notes": "Shoot delivered" }))]
pub struct UpdateBookingStatusRequest {
    /// Target status; transitions only move forward
    #[validate(length(min = 1, max = 20))]
    pub status: String,
    pub notes: Option<String>,
}

/// Fetch a booking by id
#[utoipa::path(
    get,
    path = "/api/v1/bookings/{booking_id}",
    params(("booking_id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking details"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub(crate) async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<ApiResponse<booking::Model>>, ServiceError> {
    let booking = state
        .services
        .bookings
        .get_booking(booking_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("booking {booking_id} not found")))?;

    Ok(Json(ApiResponse::success(booking)))
}

/// Admin status/notes edit through the booking state machine
#[utoipa::path(
    patch,
    path = "/api/v1/bookings/{booking_id}/status",
    params(("booking_id" = Uuid, Path, description = "Booking ID")),
    request_body = UpdateBookingStatusRequest,
    responses(
        (status = 200, description = "Booking updated"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Invalid status transition", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub(crate) async fn update_booking_status(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<UpdateBookingStatusRequest>,
) -> Result<Json<ApiResponse<booking::Model>>, ServiceError> {
    request.validate()?;

    let next = BookingStatus::parse(&request.status).ok_or_else(|| {
        ServiceError::ValidationError(format!("unknown booking status: {}", request.status))
    })?;

    let updated = state
        .services
        .bookings
        .update_status(booking_id, next, request.notes)
        .await?;

    Ok(Json(ApiResponse::success(updated)))
}

pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/:booking_id", get(get_booking))
        .route("/:booking_id/status", patch(update_booking_status))
}
