use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::round2;

/// Approximate EUR->TRY rate used when the rate API is unreachable and no
/// cached rate exists at all
const DEFAULT_EUR_TRY_RATE: Decimal = dec!(48.5);

/// Fixed buffer added to the EUR amount before conversion to absorb rate
/// drift between initialization and settlement
const RATE_BUFFER_EUR: Decimal = dec!(1);

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate: Decimal,
    fetched_at: Instant,
}

/// TTL'd single-slot cache for the exchange rate. Injected into the
/// converter so tests can control freshness without a real clock; a benign
/// refresh race between concurrent requests is acceptable since both
/// converge to the same external value.
#[derive(Debug)]
pub struct RateCache {
    slot: RwLock<Option<CachedRate>>,
    ttl: Duration,
}

impl RateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            ttl,
        }
    }

    /// Returns the cached rate only if it is still within its TTL.
    pub async fn fresh(&self) -> Option<Decimal> {
        let slot = self.slot.read().await;
        slot.filter(|cached| cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.rate)
    }

    /// Returns the cached rate regardless of age.
    pub async fn any(&self) -> Option<Decimal> {
        let slot = self.slot.read().await;
        slot.map(|cached| cached.rate)
    }

    pub async fn store(&self, rate: Decimal) {
        let mut slot = self.slot.write().await;
        *slot = Some(CachedRate {
            rate,
            fetched_at: Instant::now(),
        });
    }
}

#[derive(Debug, Deserialize)]
struct RateApiResponse {
    rates: HashMap<String, f64>,
}

/// EUR->TRY converter against a public keyless rate API with a cached rate
/// and layered fallbacks. Conversion never fails: a dead rate API degrades
/// to the last-known rate, then to a hardcoded approximation.
pub struct CurrencyConverter {
    http: reqwest::Client,
    api_url: String,
    cache: RateCache,
    fallback_rate: Decimal,
}

impl CurrencyConverter {
    pub fn new(api_url: String, cache_ttl: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_url,
            cache: RateCache::new(cache_ttl),
            fallback_rate: DEFAULT_EUR_TRY_RATE,
        }
    }

    #[cfg(test)]
    pub fn cache(&self) -> &RateCache {
        &self.cache
    }

    /// Converts an EUR amount to TRY with the safety buffer applied,
    /// rounded to 2 decimal places.
    pub async fn eur_to_try(&self, amount_eur: Decimal) -> Decimal {
        let rate = self.current_rate().await;
        round2((amount_eur + RATE_BUFFER_EUR) * rate)
    }

    /// Resolves the current EUR->TRY rate: fresh cache, then live fetch,
    /// then stale cache, then the hardcoded default.
    pub async fn current_rate(&self) -> Decimal {
        if let Some(rate) = self.cache.fresh().await {
            return rate;
        }

        match self.fetch_rate().await {
            Ok(rate) => {
                debug!(%rate, "fetched EUR->TRY rate");
                self.cache.store(rate).await;
                rate
            }
            Err(err) => {
                if let Some(stale) = self.cache.any().await {
                    warn!(error = %err, %stale, "rate API unreachable, using stale cached rate");
                    stale
                } else {
                    warn!(
                        error = %err,
                        fallback = %self.fallback_rate,
                        "rate API unreachable and no cached rate, using default"
                    );
                    self.fallback_rate
                }
            }
        }
    }

    async fn fetch_rate(&self) -> Result<Decimal, anyhow::Error> {
        let url = format!("{}?from=EUR&to=TRY", self.api_url);
        let response = self.http.get(&url).send().await?.error_for_status()?;
        let payload: RateApiResponse = response.json().await?;

        let raw = payload
            .rates
            .get("TRY")
            .copied()
            .ok_or_else(|| anyhow::anyhow!("rate API response missing TRY rate"))?;

        Decimal::from_f64(raw)
            .filter(|rate| *rate > Decimal::ZERO)
            .ok_or_else(|| anyhow::anyhow!("rate API returned unusable TRY rate: {raw}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn converter_for(uri: &str) -> CurrencyConverter {
        CurrencyConverter::new(format!("{}/latest", uri), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn converts_with_buffer_and_rounds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .and(query_param("from", "EUR"))
            .and(query_param("to", "TRY"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "base": "EUR",
                    "rates": { "TRY": 47.5 }
                })),
            )
            .mount(&server)
            .await;

        let converter = converter_for(&server.uri());
        let result = converter.eur_to_try(dec!(100)).await;
        // (100 + 1) * 47.5
        assert_eq!(result, dec!(4797.50));
    }

    #[tokio::test]
    async fn second_conversion_uses_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "rates": { "TRY": 50.0 } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let converter = converter_for(&server.uri());
        let first = converter.eur_to_try(dec!(10)).await;
        let second = converter.eur_to_try(dec!(10)).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn falls_back_to_stale_cache_when_api_down() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        // Zero TTL: anything stored is immediately stale
        let converter =
            CurrencyConverter::new(format!("{}/latest", server.uri()), Duration::ZERO);
        converter.cache().store(dec!(44)).await;

        // Stale but still preferred over the hardcoded default
        let result = converter.eur_to_try(dec!(9)).await;
        assert_eq!(result, dec!(440.00));
    }

    #[tokio::test]
    async fn falls_back_to_default_rate_with_no_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let converter = converter_for(&server.uri());
        let result = converter.eur_to_try(dec!(0)).await;
        assert_eq!(result, round2((dec!(0) + dec!(1)) * DEFAULT_EUR_TRY_RATE));
    }

    #[tokio::test]
    async fn missing_try_rate_is_an_error_not_a_panic() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "rates": { "USD": 1.1 } })),
            )
            .mount(&server)
            .await;

        let converter = converter_for(&server.uri());
        // No cache, unusable payload: hardcoded default applies
        assert_eq!(converter.current_rate().await, DEFAULT_EUR_TRY_RATE);
    }
}
