pub mod bookings;
pub mod checkout;
pub mod health;
pub mod recovery;
pub mod webhooks;

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::notifications::{EmailSender, ResendEmailSender};
use crate::payments::iyzico::IyzicoClient;
use crate::payments::turinvoice::{TurinvoiceClient, TurinvoiceConfig};
use crate::payments::PaymentProvider;
use crate::pricing::currency::CurrencyConverter;
use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use crate::services::bookings::{BookingGateway, BookingRepository};
use crate::services::checkout::{CheckoutService, ProviderRegistry};
use crate::services::recovery::RecoveryService;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub checkout: Arc<CheckoutService>,
    pub bookings: Arc<dyn BookingRepository>,
    pub recovery: Arc<RecoveryService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub email: Arc<dyn EmailSender>,
    /// Present only when the TRY invoice provider is configured; the
    /// webhook handler needs its secret check
    pub turinvoice: Option<Arc<TurinvoiceClient>>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, config: &AppConfig, event_sender: EventSender) -> Self {
        let gateway: Arc<dyn BookingRepository> = Arc::new(BookingGateway::new(db.clone()));

        let currency = Arc::new(CurrencyConverter::new(
            config.currency_api_url.clone(),
            Duration::from_secs(config.currency_cache_ttl_secs),
        ));

        let iyzico: Arc<dyn PaymentProvider> = Arc::new(IyzicoClient::new(
            config.iyzico_base_url.clone(),
            config.iyzico_api_key.clone(),
            config.iyzico_secret_key.clone(),
        ));

        let turinvoice = config.turinvoice_base_url.clone().map(|base_url| {
            Arc::new(TurinvoiceClient::new(
                TurinvoiceConfig {
                    base_url,
                    login: config.turinvoice_login.clone().unwrap_or_default(),
                    password: config.turinvoice_password.clone().unwrap_or_default(),
                    tenant_id: config.turinvoice_tenant_id.clone(),
                    callback_url: config.turinvoice_callback_url.clone(),
                    webhook_secret: config.turinvoice_secret_key.clone(),
                },
                currency,
            ))
        });

        let turinvoice_provider: Option<Arc<dyn PaymentProvider>> =
            turinvoice.clone().map(|client| {
                let provider: Arc<dyn PaymentProvider> = client;
                provider
            });
        let providers = ProviderRegistry::new(iyzico, turinvoice_provider);

        let tax_rate = rust_decimal::Decimal::try_from(config.default_tax_rate)
            .unwrap_or_else(|_| rust_decimal_macros::dec!(0.20));

        let email: Arc<dyn EmailSender> = Arc::new(ResendEmailSender::new(
            config.email_api_url.clone(),
            config.email_api_key.clone(),
            config.email_from.clone(),
        ));

        let checkout = Arc::new(CheckoutService::new(
            gateway.clone(),
            providers,
            event_sender,
            tax_rate,
        ));

        let recovery = Arc::new(RecoveryService::new(
            gateway.clone(),
            email.clone(),
            config.site_base_url.clone(),
        ));

        let rate_limiter = Arc::new(RateLimiter::new(
            db,
            RateLimitConfig {
                requests_per_window: config.rate_limit_requests_per_window,
                window: Duration::from_secs(config.rate_limit_window_seconds),
            },
        ));

        Self {
            checkout,
            bookings: gateway,
            recovery,
            rate_limiter,
            email,
            turinvoice,
        }
    }
}
