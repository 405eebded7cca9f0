//! Checkout orchestration.
//!
//! One attempt walks: validate the client-submitted total against the
//! server-recomputed price, initialize payment with the selected provider,
//! and only on provider success persist customer/booking/payment and emit
//! the post-commit event. The provider is always charged the recomputed
//! amount; the client value is validated within tolerance, then discarded.

use chrono::{NaiveDate, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::PackageId;
use crate::entities::{booking, BookingStatus, PaymentProviderKind, PaymentStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::i18n::Locale;
use crate::payments::{
    charged_amount_from_raw, error_codes, CardDetails, DeclinedPayment, PaymentCustomer,
    PaymentOutcome, PaymentProvider, PaymentRequest,
};
use crate::pricing::{package_pricing, TaxBreakdown};
use crate::services::bookings::{BookingFields, BookingRepository, NewPayment};

/// Client totals may drift from server math by float rendering; anything
/// beyond a cent is treated as tampering or a stale price.
const AMOUNT_TOLERANCE: Decimal = dec!(0.01);

/// The configured provider adapters. The card provider is always present;
/// the TRY invoice provider only when configured.
pub struct ProviderRegistry {
    iyzico: Arc<dyn PaymentProvider>,
    turinvoice: Option<Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    pub fn new(
        iyzico: Arc<dyn PaymentProvider>,
        turinvoice: Option<Arc<dyn PaymentProvider>>,
    ) -> Self {
        Self { iyzico, turinvoice }
    }

    pub fn get(
        &self,
        kind: PaymentProviderKind,
    ) -> Result<&Arc<dyn PaymentProvider>, ServiceError> {
        match kind {
            PaymentProviderKind::Iyzico => Ok(&self.iyzico),
            PaymentProviderKind::Turinvoice => self.turinvoice.as_ref().ok_or_else(|| {
                ServiceError::ValidationError(
                    "TRY invoice payments are not enabled".to_string(),
                )
            }),
        }
    }
}

/// Core checkout fields shared by the initialize and confirm steps
#[derive(Debug, Clone)]
pub struct CheckoutInput {
    pub package_id: PackageId,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub booking_date: NaiveDate,
    pub booking_time: String,
    pub notes: Option<String>,
    /// Client-submitted total, only compared against the recomputed price
    pub total_amount: Decimal,
    pub people_count: Option<u32>,
    pub locale: Locale,
}

#[derive(Debug, Clone)]
pub struct InitializeCheckout {
    pub input: CheckoutInput,
    pub provider: PaymentProviderKind,
    pub card: Option<CardDetails>,
}

#[derive(Debug, Clone)]
pub struct InitializedPayment {
    pub provider: PaymentProviderKind,
    pub provider_payment_id: String,
    pub conversation_id: String,
    pub payment_url: Option<String>,
    pub expected_total: Decimal,
}

#[derive(Debug, Clone)]
pub struct ConfirmCheckout {
    pub input: CheckoutInput,
    pub payment_id: String,
    pub conversation_id: Option<String>,
    pub provider: PaymentProviderKind,
    /// Raw provider blob the client relays back; stored for audit and used
    /// to read the actually-charged deposit
    pub provider_response: Option<Value>,
    /// Draft booking from an earlier funnel step, if any
    pub booking_id: Option<Uuid>,
    /// Client event id for ad-conversion deduplication
    pub event_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConfirmedCheckout {
    pub booking: booking::Model,
    pub payment_id: String,
    pub deposit_amount: Decimal,
}

pub struct CheckoutService {
    repo: Arc<dyn BookingRepository>,
    providers: ProviderRegistry,
    event_sender: EventSender,
    tax_rate: Decimal,
}

impl CheckoutService {
    pub fn new(
        repo: Arc<dyn BookingRepository>,
        providers: ProviderRegistry,
        event_sender: EventSender,
        tax_rate: Decimal,
    ) -> Self {
        Self {
            repo,
            providers,
            event_sender,
            tax_rate,
        }
    }

    /// Recomputes the authoritative price for this input.
    pub fn expected_pricing(&self, input: &CheckoutInput) -> TaxBreakdown {
        package_pricing(
            input.package_id,
            self.tax_rate,
            Some(input.booking_date),
            input.people_count,
        )
    }

    /// Validates the client total against the recomputed price. A mismatch
    /// short-circuits the whole attempt: no provider call, no writes.
    fn validate_amount(&self, input: &CheckoutInput) -> Result<TaxBreakdown, ServiceError> {
        let breakdown = self.expected_pricing(input);
        let delta = (breakdown.total_price - input.total_amount).abs();
        if delta > AMOUNT_TOLERANCE {
            warn!(
                expected = %breakdown.total_price,
                submitted = %input.total_amount,
                package = %input.package_id,
                "checkout amount mismatch"
            );
            metrics::counter!("checkout_amount_mismatch_total", 1);
            return Err(ServiceError::AmountMismatch {
                expected: breakdown.total_price,
                submitted: input.total_amount,
            });
        }
        Ok(breakdown)
    }

    fn decline_to_error(declined: &DeclinedPayment, locale: Locale) -> ServiceError {
        let info = error_codes::lookup(&declined.code, locale);
        info!(
            code = %declined.code,
            category = ?info.category,
            "payment declined by provider"
        );
        metrics::counter!("checkout_payment_declined_total", 1);
        ServiceError::PaymentDeclined {
            code: declined.code.clone(),
            message: info.message.to_string(),
            suggestion: info.suggestion.to_string(),
        }
    }

    fn conversation_id() -> String {
        format!(
            "bk-{}-{:06x}",
            Utc::now().format("%Y%m%d"),
            rand::thread_rng().gen_range(0u32..0xFF_FFFF)
        )
    }

    fn description(input: &CheckoutInput) -> String {
        format!(
            "{} photoshoot {} {}",
            input.package_id, input.booking_date, input.booking_time
        )
    }

    /// Step 1+2 of the pipeline: validate, then call the provider. Nothing
    /// is persisted here regardless of the outcome.
    #[instrument(skip(self, request), fields(package = %request.input.package_id, provider = %request.provider))]
    pub async fn initialize_payment(
        &self,
        request: InitializeCheckout,
    ) -> Result<InitializedPayment, ServiceError> {
        let breakdown = self.validate_amount(&request.input)?;
        let provider = self.providers.get(request.provider)?;

        let conversation_id = Self::conversation_id();
        let payment_request = PaymentRequest {
            // Always the server-recomputed total, never the client value
            amount_eur: breakdown.total_price,
            conversation_id: conversation_id.clone(),
            customer: PaymentCustomer {
                name: request.input.customer_name.clone(),
                email: request.input.customer_email.clone(),
                phone: request.input.customer_phone.clone(),
            },
            card: request.card.clone(),
            description: Self::description(&request.input),
            locale: request.input.locale,
        };

        let outcome = provider.initialize(&payment_request).await?;

        match outcome {
            PaymentOutcome::Approved(approved) => {
                info!(
                    provider_payment_id = %approved.provider_payment_id,
                    %conversation_id,
                    "payment initialized"
                );
                metrics::counter!("checkout_payment_initialized_total", 1);
                Ok(InitializedPayment {
                    provider: request.provider,
                    provider_payment_id: approved.provider_payment_id,
                    conversation_id,
                    payment_url: approved.payment_url,
                    expected_total: breakdown.total_price,
                })
            }
            PaymentOutcome::Declined(declined) => {
                Err(Self::decline_to_error(&declined, request.input.locale))
            }
        }
    }

    /// Steps 4+5 of the pipeline, entered only with a successful provider
    /// payment in hand: persist customer/booking/payment, then fan out the
    /// post-commit event. Customer upsert and payment insert are tolerant;
    /// only the booking write decides the outcome.
    #[instrument(skip(self, request), fields(package = %request.input.package_id, payment_id = %request.payment_id))]
    pub async fn confirm_booking(
        &self,
        request: ConfirmCheckout,
    ) -> Result<ConfirmedCheckout, ServiceError> {
        let breakdown = self.validate_amount(&request.input)?;
        let input = &request.input;

        // Tolerated failure: a booking without a customer row reconciles
        // later, and demo environments run without the customers table
        if let Err(err) = self
            .repo
            .upsert_customer(
                &input.customer_email,
                &input.customer_name,
                input.customer_phone.as_deref(),
            )
            .await
        {
            warn!(error = %err, email = %input.customer_email, "customer upsert failed");
        }

        let booking = self
            .repo
            .create_or_update_booking(
                request.booking_id,
                BookingFields {
                    package_id: input.package_id,
                    customer_name: input.customer_name.clone(),
                    customer_email: input.customer_email.clone(),
                    customer_phone: input.customer_phone.clone(),
                    booking_date: input.booking_date,
                    booking_time: input.booking_time.clone(),
                    status: BookingStatus::Confirmed,
                    total_amount: breakdown.total_price,
                    people_count: input.people_count.map(|count| count as i32),
                    notes: input.notes.clone(),
                    locale: input.locale,
                },
            )
            .await?;

        let deposit_amount = request
            .provider_response
            .as_ref()
            .and_then(charged_amount_from_raw)
            .unwrap_or(breakdown.total_price);
        let currency = match request.provider {
            PaymentProviderKind::Iyzico => "EUR",
            PaymentProviderKind::Turinvoice => "TRY",
        };

        // Tolerated failure: payment history reconciles out-of-band, the
        // confirmed booking must not be rolled back
        if let Err(err) = self
            .repo
            .insert_payment(
                booking.id,
                NewPayment {
                    provider_payment_id: request.payment_id.clone(),
                    conversation_id: request.conversation_id.clone(),
                    status: PaymentStatus::Success,
                    amount: deposit_amount,
                    currency: currency.to_string(),
                    provider: request.provider,
                    raw_response: request.provider_response.clone(),
                },
            )
            .await
        {
            error!(error = %err, booking_id = %booking.id, "payment record insert failed");
        }

        if let Err(err) = self
            .event_sender
            .send(Event::BookingConfirmed {
                booking_id: booking.id,
                package_id: input.package_id,
                customer_name: input.customer_name.clone(),
                customer_email: input.customer_email.clone(),
                booking_date: input.booking_date,
                booking_time: input.booking_time.clone(),
                total_amount: breakdown.total_price,
                currency: currency.to_string(),
                locale: input.locale,
                event_id: request.event_id.clone(),
            })
            .await
        {
            warn!(error = %err, booking_id = %booking.id, "post-commit event send failed");
        }

        info!(booking_id = %booking.id, %deposit_amount, "booking confirmed");
        metrics::counter!("checkout_booking_confirmed_total", 1);

        Ok(ConfirmedCheckout {
            booking,
            payment_id: request.payment_id,
            deposit_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::{ApprovedPayment, MockPaymentProvider, ProviderError};
    use crate::services::bookings::MockBookingRepository;
    use assert_matches::assert_matches;
    use axum::http::StatusCode;
    use sea_orm::DbErr;
    use tokio::sync::mpsc;

    fn input(total: Decimal) -> CheckoutInput {
        CheckoutInput {
            package_id: PackageId::Essential,
            customer_name: "Jane Doe".into(),
            customer_email: "jane@example.com".into(),
            customer_phone: None,
            // Mid-season date: no discount, expected total 150.00
            booking_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            booking_time: "10:00".into(),
            notes: None,
            total_amount: total,
            people_count: None,
            locale: Locale::Tr,
        }
    }

    fn service(
        repo: MockBookingRepository,
        provider: MockPaymentProvider,
    ) -> (CheckoutService, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(8);
        let service = CheckoutService::new(
            Arc::new(repo),
            ProviderRegistry::new(Arc::new(provider), None),
            EventSender::new(tx),
            dec!(0.20),
        );
        (service, rx)
    }

    fn approved() -> PaymentOutcome {
        PaymentOutcome::Approved(ApprovedPayment {
            provider_payment_id: "18529215".into(),
            provider_order_id: None,
            paid_amount: Some(dec!(150.00)),
            currency: "EUR".into(),
            payment_url: None,
            raw: serde_json::json!({ "status": "success" }),
        })
    }

    fn booking_model() -> booking::Model {
        booking::Model {
            id: Uuid::new_v4(),
            package_id: "essential".into(),
            customer_name: "Jane Doe".into(),
            customer_email: "jane@example.com".into(),
            customer_phone: None,
            booking_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            booking_time: "10:00".into(),
            status: "confirmed".into(),
            total_amount: dec!(150.00),
            people_count: None,
            notes: None,
            locale: "tr".into(),
            abandoned_email_sent: false,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn amount_mismatch_short_circuits_before_any_call() {
        // No expectations on either mock: any provider or repo call panics
        let (service, _rx) = service(MockBookingRepository::new(), MockPaymentProvider::new());

        let result = service
            .initialize_payment(InitializeCheckout {
                input: input(dec!(148)),
                provider: PaymentProviderKind::Iyzico,
                card: None,
            })
            .await;

        let err = result.unwrap_err();
        assert_matches!(err, ServiceError::AmountMismatch { .. });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn a_cent_of_drift_is_tolerated() {
        let mut provider = MockPaymentProvider::new();
        provider
            .expect_initialize()
            .times(1)
            .returning(|_| Ok(approved()));

        let (service, _rx) = service(MockBookingRepository::new(), provider);
        let result = service
            .initialize_payment(InitializeCheckout {
                input: input(dec!(149.99)),
                provider: PaymentProviderKind::Iyzico,
                card: None,
            })
            .await
            .unwrap();

        assert_eq!(result.expected_total, dec!(150.00));
        assert_eq!(result.provider_payment_id, "18529215");
    }

    #[tokio::test]
    async fn provider_is_charged_the_recomputed_amount() {
        let mut provider = MockPaymentProvider::new();
        provider
            .expect_initialize()
            .withf(|request| request.amount_eur == dec!(150.00))
            .times(1)
            .returning(|_| Ok(approved()));

        let (service, _rx) = service(MockBookingRepository::new(), provider);
        // Client sends 149.99; the provider must still see 150.00
        service
            .initialize_payment(InitializeCheckout {
                input: input(dec!(149.99)),
                provider: PaymentProviderKind::Iyzico,
                card: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn decline_maps_to_localized_payment_error() {
        let mut provider = MockPaymentProvider::new();
        provider.expect_initialize().times(1).returning(|_| {
            Ok(PaymentOutcome::Declined(DeclinedPayment {
                code: "10051".into(),
                provider_message: Some("Insufficient funds".into()),
                raw: serde_json::json!({ "status": "failure" }),
            }))
        });

        // Repo untouched on decline
        let (service, _rx) = service(MockBookingRepository::new(), provider);
        let err = service
            .initialize_payment(InitializeCheckout {
                input: input(dec!(150.00)),
                provider: PaymentProviderKind::Iyzico,
                card: None,
            })
            .await
            .unwrap_err();

        assert_matches!(
            err,
            ServiceError::PaymentDeclined { ref code, ref message, .. } if code == "10051"
                && message == "Kart bakiyesi yetersiz."
        );
        assert_eq!(err.status_code(), StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn transport_failure_is_retryable_external_error() {
        let mut provider = MockPaymentProvider::new();
        provider
            .expect_initialize()
            .times(1)
            .returning(|_| Err(ProviderError::Transport("connection reset".into())));

        let (service, _rx) = service(MockBookingRepository::new(), provider);
        let err = service
            .initialize_payment(InitializeCheckout {
                input: input(dec!(150.00)),
                provider: PaymentProviderKind::Iyzico,
                card: None,
            })
            .await
            .unwrap_err();

        assert_matches!(err, ServiceError::ExternalServiceError(_));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn missing_turinvoice_configuration_is_a_validation_error() {
        let (service, _rx) = service(MockBookingRepository::new(), MockPaymentProvider::new());
        let err = service
            .initialize_payment(InitializeCheckout {
                input: input(dec!(150.00)),
                provider: PaymentProviderKind::Turinvoice,
                card: None,
            })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[tokio::test]
    async fn booking_write_failure_surfaces_as_service_unavailable() {
        let mut repo = MockBookingRepository::new();
        repo.expect_upsert_customer().returning(|_, _, _| Ok(()));
        repo.expect_create_or_update_booking()
            .times(1)
            .returning(|_, _| Err(ServiceError::DatabaseError(DbErr::Custom("down".into()))));

        let (service, _rx) = service(repo, MockPaymentProvider::new());
        let err = service
            .confirm_booking(ConfirmCheckout {
                input: input(dec!(150.00)),
                payment_id: "18529215".into(),
                conversation_id: None,
                provider: PaymentProviderKind::Iyzico,
                provider_response: None,
                booking_id: None,
                event_id: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn tolerated_failures_do_not_change_the_outcome() {
        let mut repo = MockBookingRepository::new();
        // Customer upsert and payment insert both fail; booking write works
        repo.expect_upsert_customer()
            .times(1)
            .returning(|_, _, _| Err(ServiceError::db_error("customers table missing")));
        repo.expect_create_or_update_booking()
            .times(1)
            .returning(|_, _| Ok(booking_model()));
        repo.expect_insert_payment()
            .times(1)
            .returning(|_, _| Err(ServiceError::db_error("payments table missing")));

        let (service, mut rx) = service(repo, MockPaymentProvider::new());
        let confirmed = service
            .confirm_booking(ConfirmCheckout {
                input: input(dec!(150.00)),
                payment_id: "18529215".into(),
                conversation_id: Some("bk-1".into()),
                provider: PaymentProviderKind::Iyzico,
                provider_response: Some(serde_json::json!({ "paidPrice": "75.00" })),
                booking_id: None,
                event_id: Some("evt-9".into()),
            })
            .await
            .unwrap();

        // Deposit read from the provider blob, not the booking total
        assert_eq!(confirmed.deposit_amount, dec!(75.00));
        assert_eq!(confirmed.booking.status, "confirmed");

        // Post-commit event still fires
        let event = rx.recv().await.unwrap();
        let Event::BookingConfirmed { event_id, .. } = event;
        assert_eq!(event_id.as_deref(), Some("evt-9"));
    }

    #[tokio::test]
    async fn confirm_records_full_total_when_provider_blob_is_silent() {
        let mut repo = MockBookingRepository::new();
        repo.expect_upsert_customer().returning(|_, _, _| Ok(()));
        repo.expect_create_or_update_booking()
            .returning(|_, _| Ok(booking_model()));
        repo.expect_insert_payment()
            .withf(|_, payment| payment.amount == dec!(150.00) && payment.currency == "EUR")
            .times(1)
            .returning(|booking_id, payment| {
                Ok(crate::entities::payment::Model {
                    id: Uuid::new_v4(),
                    booking_id,
                    provider_payment_id: payment.provider_payment_id,
                    conversation_id: payment.conversation_id,
                    status: payment.status.as_str().into(),
                    amount: payment.amount,
                    currency: payment.currency,
                    provider: payment.provider.as_str().into(),
                    raw_response: payment.raw_response,
                    created_at: Utc::now(),
                })
            });

        let (service, _rx) = service(repo, MockPaymentProvider::new());
        let confirmed = service
            .confirm_booking(ConfirmCheckout {
                input: input(dec!(150.00)),
                payment_id: "18529215".into(),
                conversation_id: None,
                provider: PaymentProviderKind::Iyzico,
                provider_response: None,
                booking_id: None,
                event_id: None,
            })
            .await
            .unwrap();

        assert_eq!(confirmed.deposit_amount, dec!(150.00));
    }
}
