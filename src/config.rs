use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_TAX_RATE: f64 = 0.20;
const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 10;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_CURRENCY_API_URL: &str = "https://api.frankfurter.app/latest";
const DEFAULT_CURRENCY_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_IYZICO_BASE_URL: &str = "https://sandbox-api.iyzipay.com";
const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com";
const DEFAULT_EMAIL_FROM: &str = "Studio Vista <bookings@studiovista.co>";
const DEFAULT_SITE_BASE_URL: &str = "https://studiovista.co";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port (1024-65535)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Comma-separated list of allowed CORS origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Explicitly allow any origin outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    // ========== Database pool ==========
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    // ========== Pricing ==========
    /// VAT rate applied to catalog prices (fraction of base price)
    #[serde(default = "default_tax_rate")]
    #[validate(custom = "validate_tax_rate")]
    pub default_tax_rate: f64,

    /// Public EUR->TRY rate API endpoint (keyless)
    #[serde(default = "default_currency_api_url")]
    pub currency_api_url: String,

    /// How long a fetched exchange rate stays fresh
    #[serde(default = "default_currency_cache_ttl_secs")]
    pub currency_cache_ttl_secs: u64,

    // ========== Rate limiting ==========
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests_per_window: u32,

    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_seconds: u64,

    // ========== Card payment provider (Iyzico) ==========
    #[serde(default = "default_iyzico_base_url")]
    pub iyzico_base_url: String,

    #[serde(default)]
    pub iyzico_api_key: String,

    #[serde(default)]
    pub iyzico_secret_key: String,

    // ========== TRY invoice provider (Turinvoice) ==========
    #[serde(default)]
    pub turinvoice_base_url: Option<String>,

    #[serde(default)]
    pub turinvoice_login: Option<String>,

    #[serde(default)]
    pub turinvoice_password: Option<String>,

    #[serde(default)]
    pub turinvoice_tenant_id: Option<String>,

    /// Shared secret for validating inbound Turinvoice callbacks
    #[serde(default)]
    pub turinvoice_secret_key: Option<String>,

    #[serde(default)]
    pub turinvoice_callback_url: Option<String>,

    // ========== Email ==========
    #[serde(default = "default_email_api_url")]
    pub email_api_url: String,

    #[serde(default)]
    pub email_api_key: Option<String>,

    #[serde(default = "default_email_from")]
    pub email_from: String,

    /// Marketing audience to sync confirmed customers into
    #[serde(default)]
    pub email_audience_id: Option<String>,

    // ========== Ad conversion tracking ==========
    #[serde(default)]
    pub ads_pixel_id: Option<String>,

    #[serde(default)]
    pub ads_access_token: Option<String>,

    /// Public site URL used in email deep links
    #[serde(default = "default_site_base_url")]
    pub site_base_url: String,

    /// Capacity of the post-commit event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl AppConfig {
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
            || self.environment.eq_ignore_ascii_case("dev")
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
            || self.environment.eq_ignore_ascii_case("prod")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Constraints that depend on more than one field, so they cannot be
    /// expressed as per-field validator attributes.
    pub fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.is_production() {
            if self.iyzico_api_key.trim().is_empty() || self.iyzico_secret_key.trim().is_empty() {
                let mut err = ValidationError::new("required");
                err.message =
                    Some("iyzico credentials are required outside development".into());
                errors.add("iyzico_api_key", err);
            }
            if self.cors_allowed_origins.is_none() && !self.cors_allow_any_origin {
                let mut err = ValidationError::new("required");
                err.message = Some(
                    "set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
                );
                errors.add("cors_allowed_origins", err);
            }
        }

        if self.turinvoice_base_url.is_some()
            && (self.turinvoice_login.is_none() || self.turinvoice_password.is_none())
        {
            let mut err = ValidationError::new("required");
            err.message =
                Some("turinvoice_login and turinvoice_password are required when the provider is enabled".into());
            errors.add("turinvoice_login", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Whether the TRY invoice provider is configured at all.
    pub fn turinvoice_enabled(&self) -> bool {
        self.turinvoice_base_url.is_some()
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_tax_rate() -> f64 {
    DEFAULT_TAX_RATE
}

fn default_currency_api_url() -> String {
    DEFAULT_CURRENCY_API_URL.to_string()
}

fn default_currency_cache_ttl_secs() -> u64 {
    DEFAULT_CURRENCY_CACHE_TTL_SECS
}

fn default_rate_limit_requests() -> u32 {
    DEFAULT_RATE_LIMIT_REQUESTS
}

fn default_rate_limit_window_secs() -> u64 {
    DEFAULT_RATE_LIMIT_WINDOW_SECS
}

fn default_iyzico_base_url() -> String {
    DEFAULT_IYZICO_BASE_URL.to_string()
}

fn default_email_api_url() -> String {
    DEFAULT_EMAIL_API_URL.to_string()
}

fn default_email_from() -> String {
    DEFAULT_EMAIL_FROM.to_string()
}

fn default_site_base_url() -> String {
    DEFAULT_SITE_BASE_URL.to_string()
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => {
            let mut err = ValidationError::new("log_level");
            err.message = Some("log_level must be one of trace, debug, info, warn, error".into());
            Err(err)
        }
    }
}

fn validate_tax_rate(rate: f64) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&rate) {
        Ok(())
    } else {
        let mut err = ValidationError::new("range");
        err.message = Some("tax rate must be a fraction between 0 and 1".into());
        Err(err)
    }
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity >= 16 {
        Ok(())
    } else {
        let mut err = ValidationError::new("range");
        err.message = Some("event channel capacity must be at least 16".into());
        Err(err)
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Configuration validation failed: {0}")]
    Validation(ValidationErrors),
}

pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("studio_booking_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://studio-booking.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(environment: &str) -> AppConfig {
        AppConfig {
            database_url: "sqlite://studio-booking.db?mode=memory".into(),
            host: "127.0.0.1".into(),
            port: 8080,
            environment: environment.into(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            default_tax_rate: default_tax_rate(),
            currency_api_url: default_currency_api_url(),
            currency_cache_ttl_secs: default_currency_cache_ttl_secs(),
            rate_limit_requests_per_window: default_rate_limit_requests(),
            rate_limit_window_seconds: default_rate_limit_window_secs(),
            iyzico_base_url: default_iyzico_base_url(),
            iyzico_api_key: String::new(),
            iyzico_secret_key: String::new(),
            turinvoice_base_url: None,
            turinvoice_login: None,
            turinvoice_password: None,
            turinvoice_tenant_id: None,
            turinvoice_secret_key: None,
            turinvoice_callback_url: None,
            email_api_url: default_email_api_url(),
            email_api_key: None,
            email_from: default_email_from(),
            email_audience_id: None,
            ads_pixel_id: None,
            ads_access_token: None,
            site_base_url: default_site_base_url(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    #[test]
    fn production_requires_iyzico_credentials() {
        let cfg = base_config("production");
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn production_passes_with_credentials_and_cors() {
        let mut cfg = base_config("production");
        cfg.iyzico_api_key = "key".into();
        cfg.iyzico_secret_key = "secret".into();
        cfg.cors_allowed_origins = Some("https://studiovista.co".into());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn development_needs_no_credentials() {
        let cfg = base_config("development");
        assert!(cfg.validate_additional_constraints().is_ok());
        assert!(cfg.is_development());
        assert!(cfg.should_allow_permissive_cors());
    }

    #[test]
    fn turinvoice_enabled_requires_login() {
        let mut cfg = base_config("development");
        cfg.turinvoice_base_url = Some("https://portal.turinvoice.com".into());
        assert!(cfg.validate_additional_constraints().is_err());

        cfg.turinvoice_login = Some("studiovista".into());
        cfg.turinvoice_password = Some("hunter2".into());
        assert!(cfg.validate_additional_constraints().is_ok());
        assert!(cfg.turinvoice_enabled());
    }

    #[test]
    fn tax_rate_validation_bounds() {
        assert!(validate_tax_rate(0.20).is_ok());
        assert!(validate_tax_rate(0.0).is_ok());
        assert!(validate_tax_rate(1.0).is_ok());
        assert!(validate_tax_rate(1.2).is_err());
        assert!(validate_tax_rate(-0.1).is_err());
    }
}
