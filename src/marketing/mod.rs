//! Best-effort marketing integrations fired after checkout commits.
//!
//! Both clients are post-commit side effects: their failures are logged by
//! the event processor and never influence a checkout result.

use serde_json::json;
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum MarketingError {
    #[error("marketing transport error: {0}")]
    Transport(String),
    #[error("marketing API error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for MarketingError {
    fn from(err: reqwest::Error) -> Self {
        MarketingError::Transport(err.to_string())
    }
}

/// Adds confirmed customers to the mailing-list audience of the email
/// provider.
pub struct AudienceClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    audience_id: String,
}

impl AudienceClient {
    pub fn new(api_url: String, api_key: String, audience_id: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_url,
            api_key,
            audience_id,
        }
    }

    #[instrument(skip(self, name))]
    pub async fn sync_contact(&self, email: &str, name: &str) -> Result<(), MarketingError> {
        let (first_name, last_name) = match name.split_once(' ') {
            Some((first, last)) => (first.to_string(), last.to_string()),
            None => (name.to_string(), String::new()),
        };

        let response = self
            .http
            .post(format!(
                "{}/audiences/{}/contacts",
                self.api_url, self.audience_id
            ))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "email": email,
                "first_name": first_name,
                "last_name": last_name,
                "unsubscribed": false,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MarketingError::Api(format!(
                "audience sync returned HTTP {}",
                response.status()
            )));
        }

        debug!("contact synced to audience");
        Ok(())
    }
}

/// Server-side ad-platform conversion events, deduplicated against the
/// browser pixel by a client-supplied event id.
pub struct AdConversionClient {
    http: reqwest::Client,
    api_url: String,
    pixel_id: String,
    access_token: String,
}

impl AdConversionClient {
    pub fn new(pixel_id: String, access_token: String) -> Self {
        Self::with_api_url("https://graph.facebook.com/v18.0".to_string(), pixel_id, access_token)
    }

    pub fn with_api_url(api_url: String, pixel_id: String, access_token: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_url,
            pixel_id,
            access_token,
        }
    }

    #[instrument(skip(self, customer_email))]
    pub async fn track_purchase(
        &self,
        event_id: Option<&str>,
        customer_email: &str,
        value: rust_decimal::Decimal,
        currency: &str,
    ) -> Result<(), MarketingError> {
        // The ads API only accepts hashed PII
        let hashed_email = hex::encode(Sha256::digest(
            customer_email.trim().to_ascii_lowercase().as_bytes(),
        ));

        let mut event = json!({
            "event_name": "Purchase",
            "event_time": chrono::Utc::now().timestamp(),
            "action_source": "website",
            "user_data": { "em": [hashed_email] },
            "custom_data": { "value": value.to_string(), "currency": currency },
        });
        if let Some(event_id) = event_id {
            event["event_id"] = json!(event_id);
        }

        let response = self
            .http
            .post(format!("{}/{}/events", self.api_url, self.pixel_id))
            .query(&[("access_token", self.access_token.as_str())])
            .json(&json!({ "data": [event] }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MarketingError::Api(format!(
                "conversion event returned HTTP {}",
                response.status()
            )));
        }

        debug!("purchase conversion tracked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn audience_sync_splits_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audiences/aud-1/contacts"))
            .and(body_partial_json(serde_json::json!({
                "email": "jane@example.com",
                "first_name": "Jane",
                "last_name": "Doe"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "c1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = AudienceClient::new(server.uri(), "key".into(), "aud-1".into());
        client.sync_contact("jane@example.com", "Jane Doe").await.unwrap();
    }

    #[tokio::test]
    async fn conversion_event_hashes_email_and_carries_event_id() {
        let server = MockServer::start().await;
        let expected_hash = hex::encode(Sha256::digest(b"jane@example.com"));

        Mock::given(method("POST"))
            .and(path("/px-1/events"))
            .and(body_partial_json(serde_json::json!({
                "data": [{
                    "event_name": "Purchase",
                    "event_id": "evt-42",
                    "user_data": { "em": [expected_hash] }
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            AdConversionClient::with_api_url(server.uri(), "px-1".into(), "token".into());
        client
            .track_purchase(Some("evt-42"), "Jane@Example.com ", dec!(150.00), "EUR")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn api_rejection_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/px-1/events"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let client =
            AdConversionClient::with_api_url(server.uri(), "px-1".into(), "token".into());
        let result = client
            .track_purchase(None, "jane@example.com", dec!(1), "EUR")
            .await;
        assert!(matches!(result, Err(MarketingError::Api(_))));
    }
}
