//! Transactional email delivery.
//!
//! Thin client over the hosted email API plus the localized templates for
//! booking confirmations and abandoned-booking recovery. Template text
//! falls back to English for any locale we do not ship.

pub mod templates;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::catalog::PackageId;
use crate::i18n::Locale;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email service not configured")]
    NotConfigured,
    #[error("email transport error: {0}")]
    Transport(String),
    #[error("email API error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for EmailError {
    fn from(err: reqwest::Error) -> Self {
        EmailError::Transport(err.to_string())
    }
}

/// Booking confirmation payload
#[derive(Debug, Clone)]
pub struct ConfirmationEmail {
    pub to: String,
    pub customer_name: String,
    pub package_id: PackageId,
    pub booking_date: NaiveDate,
    pub booking_time: String,
    pub total_amount: Decimal,
    pub currency: String,
    pub locale: Locale,
}

/// Abandoned-booking recovery payload
#[derive(Debug, Clone)]
pub struct RecoveryEmail {
    pub to: String,
    pub customer_name: String,
    pub package_id: PackageId,
    pub resume_url: String,
    pub locale: Locale,
}

/// Seam for everything that sends mail, mockable in orchestrator and
/// recovery-job tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Returns the provider-assigned email id on success.
    async fn send_confirmation(&self, email: &ConfirmationEmail) -> Result<String, EmailError>;

    async fn send_recovery(&self, email: &RecoveryEmail) -> Result<String, EmailError>;
}

/// Hosted email API client (Resend-style: bearer key, POST /emails)
pub struct ResendEmailSender {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

impl ResendEmailSender {
    pub fn new(api_url: String, api_key: Option<String>, from: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_url,
            api_key,
            from,
        }
    }

    async fn deliver(&self, to: &str, subject: &str, html: &str) -> Result<String, EmailError> {
        let api_key = self.api_key.as_ref().ok_or(EmailError::NotConfigured)?;

        let response = self
            .http
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(api_key)
            .json(&json!({
                "from": self.from,
                "to": [to],
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?;

        let status = response.status();
        let raw: Value = response
            .json()
            .await
            .map_err(|e| EmailError::Api(format!("unparseable email API response: {e}")))?;

        if !status.is_success() {
            return Err(EmailError::Api(format!(
                "email API returned HTTP {status}: {raw}"
            )));
        }

        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        debug!(email_id = %id, "email dispatched");
        Ok(id)
    }
}

#[async_trait]
impl EmailSender for ResendEmailSender {
    #[instrument(skip(self, email), fields(to = %email.to))]
    async fn send_confirmation(&self, email: &ConfirmationEmail) -> Result<String, EmailError> {
        let subject = templates::confirmation_subject(email.locale);
        let html = templates::confirmation_body(email);
        self.deliver(&email.to, subject, &html).await
    }

    #[instrument(skip(self, email), fields(to = %email.to))]
    async fn send_recovery(&self, email: &RecoveryEmail) -> Result<String, EmailError> {
        let subject = templates::recovery_subject(email.locale);
        let html = templates::recovery_body(email);
        self.deliver(&email.to, subject, &html).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn confirmation(locale: Locale) -> ConfirmationEmail {
        ConfirmationEmail {
            to: "jane@example.com".into(),
            customer_name: "Jane".into(),
            package_id: PackageId::Premium,
            booking_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            booking_time: "10:00".into(),
            total_amount: dec!(250.00),
            currency: "EUR".into(),
            locale,
        }
    }

    #[tokio::test]
    async fn sends_through_hosted_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "to": ["jane@example.com"]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "id": "re_123" })),
            )
            .mount(&server)
            .await;

        let sender = ResendEmailSender::new(
            server.uri(),
            Some("test-key".into()),
            "Studio Vista <bookings@studiovista.co>".into(),
        );
        let id = sender.send_confirmation(&confirmation(Locale::En)).await.unwrap();
        assert_eq!(id, "re_123");
    }

    #[tokio::test]
    async fn missing_api_key_is_not_configured() {
        let sender = ResendEmailSender::new(
            "http://127.0.0.1:1".into(),
            None,
            "Studio Vista <bookings@studiovista.co>".into(),
        );
        let result = sender.send_confirmation(&confirmation(Locale::En)).await;
        assert!(matches!(result, Err(EmailError::NotConfigured)));
    }

    #[tokio::test]
    async fn api_rejection_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(serde_json::json!({ "message": "invalid from" })),
            )
            .mount(&server)
            .await;

        let sender = ResendEmailSender::new(
            server.uri(),
            Some("test-key".into()),
            "broken".into(),
        );
        let result = sender.send_confirmation(&confirmation(Locale::Tr)).await;
        assert!(matches!(result, Err(EmailError::Api(_))));
    }
}
