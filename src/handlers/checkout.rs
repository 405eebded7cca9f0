use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::catalog::PackageId;
use crate::entities::PaymentProviderKind;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::i18n::Locale;
use crate::payments::CardDetails;
use crate::services::checkout::{
    CheckoutInput, ConfirmCheckout, ConfirmedCheckout, InitializeCheckout,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CardPayload {
    #[validate(length(min = 1, max = 100))]
    pub holder_name: String,
    #[validate(length(min = 12, max = 19))]
    pub number: String,
    #[validate(length(min = 1, max = 2))]
    pub expire_month: String,
    #[validate(length(min = 2, max = 4))]
    pub expire_year: String,
    #[validate(length(min = 3, max = 4))]
    pub cvc: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "packageId": "essential",
    "customerName": "Jane Doe",
    "customerEmail": "jane@example.com",
    "customerPhone": "+441234567890",
    "bookingDate": "2025-06-01",
    "bookingTime": "10:00",
    "totalAmount": "150.00",
    "provider": "iyzico",
    "locale": "en"
}))]
pub struct InitializePaymentRequest {
    pub package_id: String,
    #[validate(length(min = 1, max = 120))]
    pub customer_name: String,
    #[validate(email)]
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub booking_date: NaiveDate,
    #[validate(length(min = 1, max = 20))]
    pub booking_time: String,
    pub notes: Option<String>,
    pub total_amount: Decimal,
    pub people_count: Option<u32>,
    /// "iyzico" (default) or "turinvoice"
    pub provider: Option<String>,
    pub card: Option<CardPayload>,
    pub locale: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitializePaymentResponse {
    pub success: bool,
    pub payment_id: String,
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    pub expected_total: Decimal,
    pub provider: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "paymentId": "18529215",
    "conversationId": "bk-20250601-1a2b3c",
    "packageId": "essential",
    "customerName": "Jane Doe",
    "customerEmail": "jane@example.com",
    "customerPhone": "+441234567890",
    "bookingDate": "2025-06-01",
    "bookingTime": "10:00",
    "totalAmount": "150.00",
    "eventId": "evt-8f3a"
}))]
pub struct ConfirmBookingRequest {
    #[validate(length(min = 1, max = 100))]
    pub payment_id: String,
    pub conversation_id: Option<String>,
    pub package_id: String,
    #[validate(length(min = 1, max = 120))]
    pub customer_name: String,
    #[validate(email)]
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub booking_date: NaiveDate,
    #[validate(length(min = 1, max = 20))]
    pub booking_time: String,
    pub notes: Option<String>,
    pub total_amount: Decimal,
    pub people_count: Option<u32>,
    /// "iyzico" (default) or "turinvoice"
    pub provider: Option<String>,
    /// Raw provider blob relayed by the client, stored for audit
    pub provider_response: Option<Value>,
    /// Draft booking id from an earlier funnel step
    pub booking_id: Option<Uuid>,
    /// Client event id for ad-conversion deduplication
    pub event_id: Option<String>,
    pub locale: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedBookingBody {
    pub id: Uuid,
    pub package_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub booking_date: NaiveDate,
    pub booking_time: String,
    pub total_amount: Decimal,
    pub status: String,
    pub payment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub people_count: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmBookingResponse {
    pub success: bool,
    pub booking: ConfirmedBookingBody,
}

fn parse_package(value: &str) -> Result<PackageId, ServiceError> {
    PackageId::parse(value)
        .ok_or_else(|| ServiceError::ValidationError(format!("unknown package id: {value}")))
}

fn parse_provider(value: Option<&str>) -> Result<PaymentProviderKind, ServiceError> {
    match value {
        None => Ok(PaymentProviderKind::Iyzico),
        Some(raw) => PaymentProviderKind::parse(raw)
            .ok_or_else(|| ServiceError::ValidationError(format!("unknown provider: {raw}"))),
    }
}

/// Validate and initialize a payment with the selected provider. Nothing
/// is persisted; a decline carries the localized message and suggestion.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/initialize",
    request_body = InitializePaymentRequest,
    responses(
        (status = 200, description = "Payment initialized", body = InitializePaymentResponse),
        (status = 400, description = "Validation or amount mismatch", body = crate::errors::ErrorResponse),
        (status = 402, description = "Payment declined", body = crate::errors::ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = crate::errors::ErrorResponse),
        (status = 502, description = "Provider unreachable", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub(crate) async fn initialize_payment(
    State(state): State<AppState>,
    Json(request): Json<InitializePaymentRequest>,
) -> Result<Json<InitializePaymentResponse>, ServiceError> {
    request.validate()?;

    let provider = parse_provider(request.provider.as_deref())?;
    let initialized = state
        .services
        .checkout
        .initialize_payment(InitializeCheckout {
            input: CheckoutInput {
                package_id: parse_package(&request.package_id)?,
                customer_name: request.customer_name,
                customer_email: request.customer_email,
                customer_phone: request.customer_phone,
                booking_date: request.booking_date,
                booking_time: request.booking_time,
                notes: request.notes,
                total_amount: request.total_amount,
                people_count: request.people_count,
                locale: Locale::parse_or_default(request.locale.as_deref().unwrap_or("en")),
            },
            provider,
            card: request.card.map(|card| CardDetails {
                holder_name: card.holder_name,
                number: card.number,
                expire_month: card.expire_month,
                expire_year: card.expire_year,
                cvc: card.cvc,
            }),
        })
        .await?;

    Ok(Json(InitializePaymentResponse {
        success: true,
        payment_id: initialized.provider_payment_id,
        conversation_id: initialized.conversation_id,
        payment_url: initialized.payment_url,
        expected_total: initialized.expected_total,
        provider: initialized.provider.as_str().to_string(),
    }))
}

/// Confirm a booking after a successful provider payment: persists
/// customer, booking and payment, then fires the post-commit side effects.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/confirm",
    request_body = ConfirmBookingRequest,
    responses(
        (status = 200, description = "Booking confirmed", body = ConfirmBookingResponse),
        (status = 400, description = "Validation or amount mismatch", body = crate::errors::ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = crate::errors::ErrorResponse),
        (status = 503, description = "Database unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub(crate) async fn confirm_booking(
    State(state): State<AppState>,
    Json(request): Json<ConfirmBookingRequest>,
) -> Result<Json<ConfirmBookingResponse>, ServiceError> {
    request.validate()?;

    let provider = parse_provider(request.provider.as_deref())?;
    let confirmed: ConfirmedCheckout = state
        .services
        .checkout
        .confirm_booking(ConfirmCheckout {
            input: CheckoutInput {
                package_id: parse_package(&request.package_id)?,
                customer_name: request.customer_name,
                customer_email: request.customer_email,
                customer_phone: request.customer_phone,
                booking_date: request.booking_date,
                booking_time: request.booking_time,
                notes: request.notes,
                total_amount: request.total_amount,
                people_count: request.people_count,
                locale: Locale::parse_or_default(request.locale.as_deref().unwrap_or("en")),
            },
            payment_id: request.payment_id,
            conversation_id: request.conversation_id,
            provider,
            provider_response: request.provider_response,
            booking_id: request.booking_id,
            event_id: request.event_id,
        })
        .await?;

    let booking = confirmed.booking;
    Ok(Json(ConfirmBookingResponse {
        success: true,
        booking: ConfirmedBookingBody {
            id: booking.id,
            package_id: booking.package_id,
            customer_name: booking.customer_name,
            customer_email: booking.customer_email,
            customer_phone: booking.customer_phone,
            booking_date: booking.booking_date,
            booking_time: booking.booking_time,
            total_amount: booking.total_amount,
            status: booking.status,
            payment_id: confirmed.payment_id,
            people_count: booking.people_count,
        },
    }))
}

/// Checkout routes; the caller wraps these in the rate-limit middleware
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/initialize", post(initialize_payment))
        .route("/confirm", post(confirm_booking))
}
