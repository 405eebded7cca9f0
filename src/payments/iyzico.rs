//! Card-payment provider adapter (Iyzico).
//!
//! Single request/response calls authenticated with the IYZWSv2 scheme:
//! an HMAC-SHA256 signature over random key + URI path + body, carried
//! base64-encoded in the Authorization header.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use rand::Rng;
use reqwest::header::CONTENT_TYPE;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{
    charged_amount_from_raw, ApprovedPayment, DeclinedPayment, OrderState, OrderStatus,
    PaymentOutcome, PaymentProvider, PaymentRequest, ProviderError, RefundResult,
};
use crate::entities::PaymentProviderKind;

type HmacSha256 = Hmac<Sha256>;

const AUTH_PATH: &str = "/payment/auth";
const DETAIL_PATH: &str = "/payment/detail";
const REFUND_PATH: &str = "/payment/refund";

pub struct IyzicoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    secret_key: String,
}

impl IyzicoClient {
    pub fn new(base_url: String, api_key: String, secret_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url,
            api_key,
            secret_key,
        }
    }

    /// Builds the IYZWSv2 Authorization header and the matching random key
    /// for a request to `uri_path` with the serialized `body`.
    fn authorization(&self, uri_path: &str, body: &str) -> Result<(String, String), ProviderError> {
        let random_key = format!(
            "{}{}",
            chrono::Utc::now().timestamp_millis(),
            rand::thread_rng().gen_range(100_000_000u32..1_000_000_000)
        );

        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| ProviderError::Protocol(format!("hmac key setup failed: {e}")))?;
        mac.update(random_key.as_bytes());
        mac.update(uri_path.as_bytes());
        mac.update(body.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        let params = format!(
            "apiKey:{}&randomKey:{}&signature:{}",
            self.api_key, random_key, signature
        );
        Ok((format!("IYZWSv2 {}", BASE64.encode(params)), random_key))
    }

    async fn call(&self, uri_path: &str, payload: &Value) -> Result<Value, ProviderError> {
        let body = serde_json::to_string(payload)
            .map_err(|e| ProviderError::Protocol(format!("request serialization: {e}")))?;
        let (authorization, random_key) = self.authorization(uri_path, &body)?;

        let response = self
            .http
            .post(format!("{}{}", self.base_url, uri_path))
            .header(CONTENT_TYPE, "application/json")
            .header("Authorization", authorization)
            .header("x-iyzi-rnd", random_key)
            .body(body)
            .send()
            .await?;

        let http_status = response.status();
        match response.json::<Value>().await {
            Ok(raw) => Ok(raw),
            Err(_) if !http_status.is_success() => Err(ProviderError::Transport(format!(
                "provider returned HTTP {http_status}"
            ))),
            Err(e) => Err(ProviderError::Protocol(format!(
                "unparseable provider response: {e}"
            ))),
        }
    }

    fn field_as_string(raw: &Value, key: &str) -> Option<String> {
        match raw.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Splits a full name into the (name, surname) pair the provider expects.
fn split_name(full_name: &str) -> (String, String) {
    let mut parts: Vec<&str> = full_name.split_whitespace().collect();
    match parts.len() {
        0 => ("Guest".to_string(), "Guest".to_string()),
        1 => (parts[0].to_string(), parts[0].to_string()),
        _ => {
            let surname = parts.pop().unwrap_or_default().to_string();
            (parts.join(" "), surname)
        }
    }
}

#[async_trait]
impl PaymentProvider for IyzicoClient {
    fn kind(&self) -> PaymentProviderKind {
        PaymentProviderKind::Iyzico
    }

    #[instrument(skip(self, request), fields(conversation_id = %request.conversation_id))]
    async fn initialize(&self, request: &PaymentRequest) -> Result<PaymentOutcome, ProviderError> {
        let card = request.card.as_ref().ok_or_else(|| {
            ProviderError::Protocol("card details are required for card payments".into())
        })?;
        let (name, surname) = split_name(&request.customer.name);
        // Two-decimal wire format regardless of internal scale
        let price = format!("{:.2}", request.amount_eur);

        let payload = json!({
            "locale": request.locale.as_str(),
            "conversationId": request.conversation_id,
            "price": price,
            "paidPrice": price,
            "currency": "EUR",
            "installment": 1,
            "paymentChannel": "WEB",
            "paymentGroup": "PRODUCT",
            "paymentCard": {
                "cardHolderName": card.holder_name,
                "cardNumber": card.number,
                "expireMonth": card.expire_month,
                "expireYear": card.expire_year,
                "cvc": card.cvc,
            },
            "buyer": {
                "id": request.customer.email,
                "name": name,
                "surname": surname,
                "email": request.customer.email,
                "gsmNumber": request.customer.phone,
            },
            "basketItems": [{
                "id": request.conversation_id,
                "name": request.description,
                "category1": "Photoshoot",
                "itemType": "VIRTUAL",
                "price": price,
            }],
        });

        let raw = self.call(AUTH_PATH, &payload).await?;

        match raw.get("status").and_then(Value::as_str) {
            Some("success") => {
                let provider_payment_id =
                    Self::field_as_string(&raw, "paymentId").ok_or_else(|| {
                        ProviderError::Protocol("success response without paymentId".into())
                    })?;
                debug!(%provider_payment_id, "card payment approved");
                Ok(PaymentOutcome::Approved(ApprovedPayment {
                    provider_payment_id,
                    provider_order_id: Self::field_as_string(&raw, "conversationId"),
                    paid_amount: charged_amount_from_raw(&raw),
                    currency: Self::field_as_string(&raw, "currency")
                        .unwrap_or_else(|| "EUR".to_string()),
                    payment_url: None,
                    raw,
                }))
            }
            Some("failure") => {
                let code = Self::field_as_string(&raw, "errorCode")
                    .unwrap_or_else(|| "unknown".to_string());
                Ok(PaymentOutcome::Declined(DeclinedPayment {
                    code,
                    provider_message: Self::field_as_string(&raw, "errorMessage"),
                    raw,
                }))
            }
            _ => Err(ProviderError::Protocol(
                "provider response missing status field".into(),
            )),
        }
    }

    async fn status(&self, provider_order_id: &str) -> Result<OrderStatus, ProviderError> {
        let payload = json!({
            "locale": "en",
            "paymentId": provider_order_id,
        });
        let raw = self.call(DETAIL_PATH, &payload).await?;

        let state = match raw.get("paymentStatus").and_then(Value::as_str) {
            Some("SUCCESS") => OrderState::Paid,
            Some("FAILURE") => OrderState::Cancelled,
            Some("INIT_THREEDS") | Some("CALLBACK_THREEDS") | Some("PENDING") => {
                OrderState::Pending
            }
            _ => OrderState::Unknown,
        };

        Ok(OrderStatus {
            state,
            paid_amount: charged_amount_from_raw(&raw),
            raw,
        })
    }

    async fn refund(
        &self,
        provider_order_id: &str,
        amount: Option<Decimal>,
    ) -> Result<RefundResult, ProviderError> {
        let mut payload = json!({
            "locale": "en",
            "paymentTransactionId": provider_order_id,
        });
        if let Some(amount) = amount {
            payload["price"] = Value::String(format!("{:.2}", amount));
        }

        let raw = self.call(REFUND_PATH, &payload).await?;
        match raw.get("status").and_then(Value::as_str) {
            Some("success") => Ok(RefundResult {
                provider_refund_id: Self::field_as_string(&raw, "paymentId"),
                raw,
            }),
            Some("failure") => Err(ProviderError::Protocol(format!(
                "refund rejected: {}",
                Self::field_as_string(&raw, "errorMessage").unwrap_or_default()
            ))),
            _ => Err(ProviderError::Protocol(
                "provider response missing status field".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Locale;
    use crate::payments::{CardDetails, PaymentCustomer};
    use rust_decimal_macros::dec;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> PaymentRequest {
        PaymentRequest {
            amount_eur: dec!(150.00),
            conversation_id: "bk-20250601-A1B2".into(),
            customer: PaymentCustomer {
                name: "Ayşe Yılmaz".into(),
                email: "ayse@example.com".into(),
                phone: Some("+905551112233".into()),
            },
            card: Some(CardDetails {
                holder_name: "AYSE YILMAZ".into(),
                number: "5528790000000008".into(),
                expire_month: "12".into(),
                expire_year: "2030".into(),
                cvc: "123".into(),
            }),
            description: "Premium photoshoot 2025-06-01 10:00".into(),
            locale: Locale::Tr,
        }
    }

    #[tokio::test]
    async fn approved_payment_parses_and_signs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment/auth"))
            .and(header_exists("Authorization"))
            .and(header_exists("x-iyzi-rnd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "paymentId": "18529215",
                "conversationId": "bk-20250601-A1B2",
                "paidPrice": "150.00",
                "currency": "EUR"
            })))
            .mount(&server)
            .await;

        let client = IyzicoClient::new(server.uri(), "api-key".into(), "secret".into());
        let outcome = client.initialize(&request()).await.unwrap();

        match outcome {
            PaymentOutcome::Approved(approved) => {
                assert_eq!(approved.provider_payment_id, "18529215");
                assert_eq!(approved.paid_amount, Some(dec!(150.00)));
                assert_eq!(approved.currency, "EUR");
            }
            other => panic!("expected approval, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn declined_payment_surfaces_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment/auth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "failure",
                "errorCode": "10051",
                "errorMessage": "Insufficient funds"
            })))
            .mount(&server)
            .await;

        let client = IyzicoClient::new(server.uri(), "api-key".into(), "secret".into());
        let outcome = client.initialize(&request()).await.unwrap();

        match outcome {
            PaymentOutcome::Declined(declined) => {
                assert_eq!(declined.code, "10051");
                assert_eq!(declined.provider_message.as_deref(), Some("Insufficient funds"));
            }
            other => panic!("expected decline, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn numeric_error_codes_are_stringified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment/auth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "failure",
                "errorCode": 10054
            })))
            .mount(&server)
            .await;

        let client = IyzicoClient::new(server.uri(), "api-key".into(), "secret".into());
        match client.initialize(&request()).await.unwrap() {
            PaymentOutcome::Declined(declined) => assert_eq!(declined.code, "10054"),
            other => panic!("expected decline, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn http_error_without_body_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment/auth"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = IyzicoClient::new(server.uri(), "api-key".into(), "secret".into());
        let result = client.initialize(&request()).await;
        assert!(matches!(result, Err(ProviderError::Transport(_))));
    }

    #[tokio::test]
    async fn status_maps_payment_states() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment/detail"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "paymentStatus": "SUCCESS",
                "paidPrice": "150.00"
            })))
            .mount(&server)
            .await;

        let client = IyzicoClient::new(server.uri(), "api-key".into(), "secret".into());
        let status = client.status("18529215").await.unwrap();
        assert_eq!(status.state, OrderState::Paid);
        assert_eq!(status.paid_amount, Some(dec!(150.00)));
    }

    #[tokio::test]
    async fn refund_posts_amount_and_parses_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment/refund"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "paymentId": "18529215"
            })))
            .mount(&server)
            .await;

        let client = IyzicoClient::new(server.uri(), "api-key".into(), "secret".into());
        let refund = client.refund("987654", Some(dec!(50.00))).await.unwrap();
        assert_eq!(refund.provider_refund_id.as_deref(), Some("18529215"));
    }

    #[tokio::test]
    async fn rejected_refund_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment/refund"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "failure",
                "errorMessage": "Refund window expired"
            })))
            .mount(&server)
            .await;

        let client = IyzicoClient::new(server.uri(), "api-key".into(), "secret".into());
        let result = client.refund("987654", None).await;
        assert!(matches!(result, Err(ProviderError::Protocol(_))));
    }

    #[test]
    fn split_name_handles_middle_names() {
        assert_eq!(
            split_name("Mehmet Ali Kaya"),
            ("Mehmet Ali".to_string(), "Kaya".to_string())
        );
        assert_eq!(split_name("Cher"), ("Cher".to_string(), "Cher".to_string()));
    }
}
