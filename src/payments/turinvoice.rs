//! TRY-invoice provider adapter (Turinvoice).
//!
//! The provider is session-based: every operation logs in, gets a bearer
//! token, and runs its calls under it. There is no session reuse across
//! operations. A 401 anywhere means the session expired mid-flight; the
//! whole login+operation sequence is retried exactly once.

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{
    charged_amount_from_raw, ApprovedPayment, DeclinedPayment, OrderState, OrderStatus,
    PaymentOutcome, PaymentProvider, PaymentRequest, ProviderError, RefundResult,
};
use crate::entities::PaymentProviderKind;
use crate::pricing::currency::CurrencyConverter;

#[derive(Debug, Clone)]
pub struct TurinvoiceConfig {
    pub base_url: String,
    pub login: String,
    pub password: String,
    pub tenant_id: Option<String>,
    pub callback_url: Option<String>,
    pub webhook_secret: Option<String>,
}

pub struct TurinvoiceClient {
    http: reqwest::Client,
    config: TurinvoiceConfig,
    currency: Arc<CurrencyConverter>,
}

struct Session {
    token: String,
}

impl TurinvoiceClient {
    pub fn new(config: TurinvoiceConfig, currency: Arc<CurrencyConverter>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            config,
            currency,
        }
    }

    /// Validates an inbound callback by shared-secret equality.
    pub fn verify_webhook(&self, provided_secret: &str) -> bool {
        match &self.config.webhook_secret {
            Some(expected) => expected == provided_secret,
            None => false,
        }
    }

    async fn login(&self) -> Result<Session, ProviderError> {
        let response = self
            .http
            .post(format!("{}/api/v1/login", self.config.base_url))
            .json(&json!({
                "userName": self.config.login,
                "password": self.config.password,
                "tenantId": self.config.tenant_id,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Transport(format!(
                "login failed with HTTP {}",
                response.status()
            )));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Protocol(format!("unparseable login response: {e}")))?;
        let token = raw
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Protocol("login response without token".into()))?;

        Ok(Session {
            token: token.to_string(),
        })
    }

    /// Runs `op` under a fresh session. If the operation reports an expired
    /// session (HTTP 401), logs in again and retries once; a second 401 is
    /// returned as-is.
    async fn with_session<T, F, Fut>(&self, op: F) -> Result<T, ProviderError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let session = self.login().await?;
        match op(session.token).await {
            Err(ProviderError::SessionExpired(reason)) => {
                warn!(%reason, "provider session expired, retrying with a fresh login");
                let session = self.login().await?;
                op(session.token).await
            }
            other => other,
        }
    }

    /// Converts a 401 into the session-expired error `with_session` retries
    /// on; all other non-success statuses are terminal for this attempt.
    async fn read_json(response: reqwest::Response) -> Result<Value, ProviderError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ProviderError::SessionExpired(format!("HTTP {status}")));
        }

        let raw: Value = response.json().await.map_err(|e| {
            if status.is_success() {
                ProviderError::Protocol(format!("unparseable provider response: {e}"))
            } else {
                ProviderError::Transport(format!("provider returned HTTP {status}"))
            }
        })?;

        Ok(raw)
    }

    async fn put_order(&self, token: &str, payload: &Value) -> Result<Value, ProviderError> {
        let response = self
            .http
            .put(format!("{}/api/v1/orders", self.config.base_url))
            .bearer_auth(token)
            .json(payload)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn get_order(&self, token: &str, order_id: &str) -> Result<Value, ProviderError> {
        let response = self
            .http
            .get(format!(
                "{}/api/v1/orders/{}",
                self.config.base_url, order_id
            ))
            .bearer_auth(token)
            .send()
            .await?;
        Self::read_json(response).await
    }

    /// Fetches the payment QR code for an order, base64-encoded.
    pub async fn qr_code(&self, order_id: &str) -> Result<String, ProviderError> {
        let raw = self
            .with_session(|token| {
                let order_id = order_id.to_string();
                async move {
                    let response = self
                        .http
                        .get(format!(
                            "{}/api/v1/orders/{}/qr",
                            self.config.base_url, order_id
                        ))
                        .bearer_auth(&token)
                        .send()
                        .await?;
                    Self::read_json(response).await
                }
            })
            .await?;

        raw.get("qrCode")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Protocol("order response without qrCode".into()))
    }

    fn order_id_of(raw: &Value) -> Option<String> {
        match raw.get("orderId") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    fn map_state(raw: &Value) -> OrderState {
        match raw
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("paid") | Some("completed") => OrderState::Paid,
            Some("created") | Some("pending") | Some("awaiting_payment") => OrderState::Pending,
            Some("cancelled") | Some("canceled") | Some("expired") => OrderState::Cancelled,
            _ => OrderState::Unknown,
        }
    }
}

/// The portal issues payment links on its international domain, but
/// settlement only works on the .com.tr one. Rewrite the host, keep
/// everything else.
fn rewrite_payment_url(raw_url: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw_url) else {
        return raw_url.to_string();
    };
    let Some(host) = parsed.host_str().map(str::to_string) else {
        return raw_url.to_string();
    };
    if let Some(prefix) = host.strip_suffix("turinvoice.com") {
        let rewritten = format!("{prefix}turinvoice.com.tr");
        if parsed.set_host(Some(&rewritten)).is_ok() {
            return parsed.to_string();
        }
    }
    raw_url.to_string()
}

#[async_trait]
impl PaymentProvider for TurinvoiceClient {
    fn kind(&self) -> PaymentProviderKind {
        PaymentProviderKind::Turinvoice
    }

    #[instrument(skip(self, request), fields(conversation_id = %request.conversation_id))]
    async fn initialize(&self, request: &PaymentRequest) -> Result<PaymentOutcome, ProviderError> {
        // The provider only accepts TRY; convert the EUR amount up front
        let amount_try = self.currency.eur_to_try(request.amount_eur).await;

        let payload = json!({
            "conversationId": request.conversation_id,
            // Two-decimal wire format regardless of internal scale
            "amount": format!("{:.2}", amount_try),
            "currency": "TRY",
            "description": request.description,
            "callbackUrl": self.config.callback_url,
            "customer": {
                "name": request.customer.name,
                "email": request.customer.email,
                "phone": request.customer.phone,
            },
        });

        let detail = self
            .with_session(|token| {
                let payload = payload.clone();
                async move {
                    let created = self.put_order(&token, &payload).await?;

                    if let Some(error) = created.get("error") {
                        let code = error
                            .get("code")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown")
                            .to_string();
                        return Ok(Err(DeclinedPayment {
                            code,
                            provider_message: error
                                .get("message")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                            raw: created,
                        }));
                    }

                    let order_id = Self::order_id_of(&created).ok_or_else(|| {
                        ProviderError::Protocol("create-order response without orderId".into())
                    })?;

                    // The create response is thin; the full detail (payment
                    // URL included) comes from a follow-up fetch
                    let detail = self.get_order(&token, &order_id).await?;
                    Ok(Ok(detail))
                }
            })
            .await?;

        let detail = match detail {
            Ok(detail) => detail,
            Err(declined) => return Ok(PaymentOutcome::Declined(declined)),
        };

        let order_id = Self::order_id_of(&detail)
            .ok_or_else(|| ProviderError::Protocol("order detail without orderId".into()))?;
        let payment_url = detail
            .get("paymentUrl")
            .and_then(Value::as_str)
            .map(rewrite_payment_url);

        debug!(%order_id, "invoice order created");
        Ok(PaymentOutcome::Approved(ApprovedPayment {
            provider_payment_id: order_id.clone(),
            provider_order_id: Some(order_id),
            paid_amount: charged_amount_from_raw(&detail),
            currency: "TRY".to_string(),
            payment_url,
            raw: detail,
        }))
    }

    async fn status(&self, provider_order_id: &str) -> Result<OrderStatus, ProviderError> {
        let raw = self
            .with_session(|token| {
                let order_id = provider_order_id.to_string();
                async move { self.get_order(&token, &order_id).await }
            })
            .await?;

        Ok(OrderStatus {
            state: Self::map_state(&raw),
            paid_amount: charged_amount_from_raw(&raw),
            raw,
        })
    }

    async fn refund(
        &self,
        provider_order_id: &str,
        amount: Option<Decimal>,
    ) -> Result<RefundResult, ProviderError> {
        let raw = self
            .with_session(|token| {
                let order_id = provider_order_id.to_string();
                let payload = match amount {
                    Some(amount) => json!({ "amount": format!("{:.2}", amount) }),
                    None => json!({}),
                };
                async move {
                    let response = self
                        .http
                        .post(format!(
                            "{}/api/v1/orders/{}/refund",
                            self.config.base_url, order_id
                        ))
                        .bearer_auth(&token)
                        .json(&payload)
                        .send()
                        .await?;
                    Self::read_json(response).await
                }
            })
            .await?;

        Ok(RefundResult {
            provider_refund_id: raw
                .get("refundId")
                .and_then(Value::as_str)
                .map(str::to_string),
            raw,
        })
    }
}
