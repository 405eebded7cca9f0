//! Database-backed sliding-window rate limiting.
//!
//! Counters live in the `rate_limits` table keyed by client IP, so the
//! limit is consistent across horizontally scaled instances at the cost of
//! an extra round-trip per request. When the store itself is unreachable
//! the limiter fails open: an infrastructure hiccup must not block
//! legitimate checkout traffic.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::entities::rate_limit;
use crate::errors::ServiceError;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 10,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u32, reset_secs: u64 },
    Limited { retry_after_secs: u64 },
}

pub struct RateLimiter {
    db: Arc<DatabaseConnection>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(db: Arc<DatabaseConnection>, config: RateLimitConfig) -> Self {
        Self { db, config }
    }

    /// Checks and counts one request for `identifier`. Store failures log
    /// and allow.
    pub async fn check(&self, identifier: &str) -> RateLimitDecision {
        match self.check_inner(identifier).await {
            Ok(decision) => decision,
            Err(err) => {
                warn!(error = %err, "rate limit store unavailable, failing open");
                metrics::counter!("rate_limit_fail_open_total", 1);
                RateLimitDecision::Allowed {
                    remaining: self.config.requests_per_window,
                    reset_secs: self.config.window.as_secs(),
                }
            }
        }
    }

    async fn check_inner(&self, identifier: &str) -> Result<RateLimitDecision, ServiceError> {
        let now = Utc::now();
        let window = ChronoDuration::from_std(self.config.window)
            .unwrap_or_else(|_| ChronoDuration::seconds(60));
        let limit = self.config.requests_per_window;

        let existing = rate_limit::Entity::find_by_id(identifier.to_string())
            .one(&*self.db)
            .await?;

        match existing {
            None => {
                rate_limit::ActiveModel {
                    identifier: Set(identifier.to_string()),
                    count: Set(1),
                    window_start: Set(now),
                }
                .insert(&*self.db)
                .await?;
                Ok(RateLimitDecision::Allowed {
                    remaining: limit.saturating_sub(1),
                    reset_secs: window.num_seconds() as u64,
                })
            }
            Some(entry) => {
                let elapsed = now.signed_duration_since(entry.window_start);
                if elapsed >= window {
                    // Window rolled over: restart the count
                    let mut active: rate_limit::ActiveModel = entry.into();
                    active.count = Set(1);
                    active.window_start = Set(now);
                    active.update(&*self.db).await?;
                    return Ok(RateLimitDecision::Allowed {
                        remaining: limit.saturating_sub(1),
                        reset_secs: window.num_seconds() as u64,
                    });
                }

                let count = entry.count.max(0) as u32;
                let reset_secs = (window - elapsed).num_seconds().max(0) as u64;
                if count >= limit {
                    debug!(%identifier, count, "rate limit exceeded");
                    metrics::counter!("rate_limit_exceeded_total", 1);
                    return Ok(RateLimitDecision::Limited {
                        retry_after_secs: reset_secs.max(1),
                    });
                }

                let mut active: rate_limit::ActiveModel = entry.into();
                active.count = Set((count + 1) as i32);
                active.update(&*self.db).await?;
                Ok(RateLimitDecision::Allowed {
                    remaining: limit.saturating_sub(count + 1),
                    reset_secs,
                })
            }
        }
    }
}

/// Best-effort client identifier: first X-Forwarded-For hop, else the
/// literal peer address header some proxies set, else a shared bucket.
fn client_identifier(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }

    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
    {
        return real_ip.trim().to_string();
    }

    "unknown".to_string()
}

/// Axum middleware guarding the checkout endpoints.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let identifier = client_identifier(&request);

    match limiter.check(&identifier).await {
        RateLimitDecision::Allowed {
            remaining,
            reset_secs,
        } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            if let Ok(value) =
                header::HeaderValue::from_str(&limiter.config.requests_per_window.to_string())
            {
                headers.insert("x-ratelimit-limit", value);
            }
            if let Ok(value) = header::HeaderValue::from_str(&remaining.to_string()) {
                headers.insert("x-ratelimit-remaining", value);
            }
            if let Ok(value) = header::HeaderValue::from_str(&reset_secs.to_string()) {
                headers.insert("x-ratelimit-reset", value);
            }
            response
        }
        RateLimitDecision::Limited { retry_after_secs } => {
            ServiceError::RateLimitExceeded { retry_after_secs }.into_response()
        }
    }
}
