pub mod error_codes;
pub mod iyzico;
pub mod turinvoice;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::PaymentProviderKind;
use crate::errors::ServiceError;
use crate::i18n::Locale;

/// Customer details forwarded to a provider during initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCustomer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Card data for the card-payment provider. Never logged in full.
#[derive(Clone, Serialize, Deserialize)]
pub struct CardDetails {
    pub holder_name: String,
    pub number: String,
    pub expire_month: String,
    pub expire_year: String,
    pub cvc: String,
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masked = if self.number.len() >= 4 {
            format!("****{}", &self.number[self.number.len() - 4..])
        } else {
            "****".to_string()
        };
        f.debug_struct("CardDetails")
            .field("holder_name", &self.holder_name)
            .field("number", &masked)
            .field("expire_month", &self.expire_month)
            .field("expire_year", &self.expire_year)
            .field("cvc", &"***")
            .finish()
    }
}

/// Normalized initialize-payment request handed to any provider adapter
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    /// Server-recomputed amount in EUR; adapters convert if the provider
    /// settles in another currency
    pub amount_eur: Decimal,
    pub conversation_id: String,
    pub customer: PaymentCustomer,
    pub card: Option<CardDetails>,
    pub description: String,
    pub locale: Locale,
}

/// Successful provider initialization
#[derive(Debug, Clone)]
pub struct ApprovedPayment {
    pub provider_payment_id: String,
    pub provider_order_id: Option<String>,
    /// What the provider reports as actually charged, when it reports it
    pub paid_amount: Option<Decimal>,
    pub currency: String,
    /// Redirect URL for providers that collect payment on their own page
    pub payment_url: Option<String>,
    pub raw: serde_json::Value,
}

/// Provider-declared decline; terminal, carries the provider's error code
#[derive(Debug, Clone)]
pub struct DeclinedPayment {
    pub code: String,
    pub provider_message: Option<String>,
    pub raw: serde_json::Value,
}

/// Result of an initialize call that reached the provider and got a
/// decision back
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    Approved(ApprovedPayment),
    Declined(DeclinedPayment),
}

/// Where a provider-side order currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Pending,
    Paid,
    Cancelled,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct OrderStatus {
    pub state: OrderState,
    pub paid_amount: Option<Decimal>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct RefundResult {
    pub provider_refund_id: Option<String>,
    pub raw: serde_json::Value,
}

/// Failures that never carry a provider decision: the network died, the
/// session expired, or the response made no sense. Distinct from a decline,
/// which is a real answer. Only these are retryable.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("session expired: {0}")]
    SessionExpired(String),

    #[error("unexpected provider response: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err.to_string())
    }
}

impl From<ProviderError> for ServiceError {
    fn from(err: ProviderError) -> Self {
        ServiceError::ExternalServiceError(err.to_string())
    }
}

/// Capability contract both payment providers implement.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn kind(&self) -> PaymentProviderKind;

    async fn initialize(&self, request: &PaymentRequest) -> Result<PaymentOutcome, ProviderError>;

    async fn status(&self, provider_order_id: &str) -> Result<OrderStatus, ProviderError>;

    async fn refund(
        &self,
        provider_order_id: &str,
        amount: Option<Decimal>,
    ) -> Result<RefundResult, ProviderError>;
}

/// Reads the amount a provider reports as charged out of a raw response
/// blob. Providers are inconsistent about the field name and type.
pub fn charged_amount_from_raw(raw: &serde_json::Value) -> Option<Decimal> {
    for key in ["paidPrice", "paidAmount", "amount"] {
        match raw.get(key) {
            Some(serde_json::Value::String(s)) => {
                if let Ok(parsed) = s.parse::<Decimal>() {
                    return Some(parsed);
                }
            }
            Some(serde_json::Value::Number(n)) => {
                use rust_decimal::prelude::FromPrimitive;
                if let Some(parsed) = n.as_f64().and_then(Decimal::from_f64) {
                    return Some(parsed);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn card_debug_masks_pan_and_cvc() {
        let card = CardDetails {
            holder_name: "Jane Doe".into(),
            number: "5528790000000008".into(),
            expire_month: "12".into(),
            expire_year: "2030".into(),
            cvc: "123".into(),
        };
        let rendered = format!("{:?}", card);
        assert!(rendered.contains("****0008"));
        assert!(!rendered.contains("5528790000000008"));
        assert!(!rendered.contains("123"));
    }

    #[test]
    fn charged_amount_reads_string_and_number_fields() {
        let raw = serde_json::json!({ "paidPrice": "75.00" });
        assert_eq!(charged_amount_from_raw(&raw), Some(dec!(75.00)));

        let raw = serde_json::json!({ "paidAmount": 3600.5 });
        assert_eq!(charged_amount_from_raw(&raw), Some(dec!(3600.5)));

        let raw = serde_json::json!({ "status": "success" });
        assert_eq!(charged_amount_from_raw(&raw), None);
    }
}
