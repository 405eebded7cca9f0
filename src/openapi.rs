use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Studio Booking API",
        version = "0.3.0",
        description = r#"
Backend for a localized photography-booking platform.

- **Checkout**: tax-inclusive package pricing, multi-provider payment
  initialization (card via Iyzico, TRY invoice via Turinvoice) and booking
  confirmation with post-commit side effects
- **Bookings**: lookup and admin status edits through the booking state
  machine
- **Recovery**: scheduler-triggered abandoned-booking email sweep

Checkout endpoints are rate limited per client IP. Check the
`X-RateLimit-*` response headers and honor `Retry-After` on 429.
"#
    ),
    paths(
        crate::handlers::checkout::initialize_payment,
        crate::handlers::checkout::confirm_booking,
        crate::handlers::bookings::get_booking,
        crate::handlers::bookings::update_booking_status,
        crate::handlers::recovery::run_abandoned_sweep,
        crate::handlers::webhooks::turinvoice_callback,
        crate::handlers::health::health,
    ),
    components(
        schemas(
            crate::handlers::checkout::InitializePaymentRequest,
            crate::handlers::checkout::InitializePaymentResponse,
            crate::handlers::checkout::ConfirmBookingRequest,
            crate::handlers::checkout::ConfirmBookingResponse,
            crate::handlers::checkout::ConfirmedBookingBody,
            crate::handlers::checkout::CardPayload,
            crate::handlers::bookings::UpdateBookingStatusRequest,
            crate::handlers::webhooks::TurinvoiceCallback,
            crate::services::recovery::RecoveryOutcome,
            crate::pricing::TaxBreakdown,
            crate::errors::ErrorResponse,
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
