use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

use crate::circuit_breaker::CircuitBreakerConfig;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_AFFIRM_SANDBOX_URL: &str = "https://sandbox.affirm.com/api/v2";
const DEFAULT_AFFIRM_PRODUCTION_URL: &str = "https://api.affirm.com/api/v2";
const DEFAULT_AFFIRM_TIMEOUT_SECS: u64 = 15;
/// Headroom on top of provider time for lock waits and the database commit
const REQUEST_TIMEOUT_MARGIN_SECS: u64 = 5;

/// Affirm API endpoints and client limits
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AffirmConfig {
    /// Base URL used when a payment method is in test mode
    #[serde(default = "default_affirm_sandbox_url")]
    #[validate(url)]
    pub sandbox_base_url: String,

    /// Base URL used for live payment methods
    #[serde(default = "default_affirm_production_url")]
    #[validate(url)]
    pub production_base_url: String,

    /// Upper bound for one authorize + capture exchange (seconds)
    #[serde(default = "default_affirm_timeout_secs")]
    #[validate(range(min = 1, max = 120))]
    pub timeout_secs: u64,
}

impl Default for AffirmConfig {
    fn default() -> Self {
        Self {
            sandbox_base_url: default_affirm_sandbox_url(),
            production_base_url: default_affirm_production_url(),
            timeout_secs: default_affirm_timeout_secs(),
        }
    }
}

/// Storefront checkout paths the callbacks redirect to
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct StorefrontConfig {
    #[serde(default = "default_cart_path")]
    #[validate(custom = "validate_path")]
    pub cart_path: String,

    #[serde(default = "default_payment_path")]
    #[validate(custom = "validate_path")]
    pub payment_path: String,

    #[serde(default = "default_confirm_path")]
    #[validate(custom = "validate_path")]
    pub confirm_path: String,

    /// Order detail pages live at `{order_path_prefix}/{order number}`
    #[serde(default = "default_order_path_prefix")]
    #[validate(custom = "validate_path")]
    pub order_path_prefix: String,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            cart_path: default_cart_path(),
            payment_path: default_payment_path(),
            confirm_path: default_confirm_path(),
            order_path_prefix: default_order_path_prefix(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_request_timeout", skip_on_field_errors = false))]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
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

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1))]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Whole-request timeout applied by the HTTP layer (seconds)
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,

    /// Affirm provider settings
    #[serde(default)]
    #[validate]
    pub affirm: AffirmConfig,

    /// Redirect targets
    #[serde(default)]
    #[validate]
    pub storefront: StorefrontConfig,

    // ========== Circuit Breaker Configuration ==========
    /// Number of failures before circuit breaker opens
    #[serde(default = "default_circuit_breaker_failures")]
    #[validate(range(min = 1))]
    pub circuit_breaker_failure_threshold: u32,

    /// Circuit breaker reset timeout in seconds
    #[serde(default = "default_circuit_breaker_timeout")]
    pub circuit_breaker_timeout_secs: u64,

    /// Successful probes needed to close a half-open circuit
    #[serde(default = "default_circuit_breaker_successes")]
    #[validate(range(min = 1))]
    pub circuit_breaker_success_threshold: u32,
}

impl AppConfig {
    /// Creates a new configuration with defaults for everything else
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            affirm: AffirmConfig::default(),
            storefront: StorefrontConfig::default(),
            circuit_breaker_failure_threshold: default_circuit_breaker_failures(),
            circuit_breaker_timeout_secs: default_circuit_breaker_timeout(),
            circuit_breaker_success_threshold: default_circuit_breaker_successes(),
        }
    }

    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker_failure_threshold,
            timeout: Duration::from_secs(self.circuit_breaker_timeout_secs),
            success_threshold: self.circuit_breaker_success_threshold,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_request_timeout_secs() -> u64 {
    45
}

fn default_affirm_sandbox_url() -> String {
    DEFAULT_AFFIRM_SANDBOX_URL.to_string()
}

fn default_affirm_production_url() -> String {
    DEFAULT_AFFIRM_PRODUCTION_URL.to_string()
}

fn default_affirm_timeout_secs() -> u64 {
    DEFAULT_AFFIRM_TIMEOUT_SECS
}

fn default_cart_path() -> String {
    "/checkout/cart".to_string()
}

fn default_payment_path() -> String {
    "/checkout/payment".to_string()
}

fn default_confirm_path() -> String {
    "/checkout/confirm".to_string()
}

fn default_order_path_prefix() -> String {
    "/orders".to_string()
}

fn default_circuit_breaker_failures() -> u32 {
    5 // Number of failures before circuit opens
}

fn default_circuit_breaker_timeout() -> u64 {
    60 // 60 seconds reset timeout
}

fn default_circuit_breaker_successes() -> u32 {
    2
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// A confirmation may wait out another confirmation's provider exchange on the
/// order lock before running its own.
fn validate_request_timeout(cfg: &AppConfig) -> Result<(), ValidationError> {
    let required = cfg
        .affirm
        .timeout_secs
        .saturating_mul(2)
        .saturating_add(REQUEST_TIMEOUT_MARGIN_SECS);
    if cfg.request_timeout_secs >= required {
        Ok(())
    } else {
        let mut err = ValidationError::new("request_timeout_secs");
        err.message = Some(
            format!(
                "request_timeout_secs must be at least {} (twice affirm.timeout_secs plus {})",
                required, REQUEST_TIMEOUT_MARGIN_SECS
            )
            .into(),
        );
        Err(err)
    }
}

fn validate_path(path: &str) -> Result<(), ValidationError> {
    if path.starts_with('/') && !path.contains("://") && !path.contains('?') {
        Ok(())
    } else {
        let mut err = ValidationError::new("storefront_path");
        err.message = Some("Storefront paths must be site-relative and start with '/'".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("affirm_checkout={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let builder = fmt().with_env_filter(EnvFilter::new(filter_directive));
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
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
        .set_default("database_url", "sqlite://affirm_checkout.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", run_env.as_str())?
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

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
        )
    }

    #[test]
    fn defaults_pass_validation() {
        let cfg = base_config();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.storefront.cart_path, "/checkout/cart");
        assert_eq!(cfg.affirm.timeout_secs, 15);
        assert!(cfg.request_timeout() > Duration::from_secs(cfg.affirm.timeout_secs * 2));
    }

    #[test]
    fn request_timeout_must_cover_two_provider_exchanges() {
        let mut cfg = base_config();
        cfg.affirm.timeout_secs = 15;
        cfg.request_timeout_secs = 30;
        assert!(cfg.validate().is_err());

        cfg.request_timeout_secs = 35;
        assert!(cfg.validate().is_ok());

        cfg.affirm.timeout_secs = 10;
        cfg.request_timeout_secs = 25;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn absolute_storefront_urls_are_rejected() {
        let mut cfg = base_config();
        cfg.storefront.confirm_path = "https://evil.example/confirm".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_provider_timeout_is_rejected() {
        let mut cfg = base_config();
        cfg.affirm.timeout_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut cfg = base_config();
        cfg.log_level = "chatty".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn circuit_breaker_settings_are_carried_over() {
        let mut cfg = base_config();
        cfg.circuit_breaker_failure_threshold = 3;
        cfg.circuit_breaker_timeout_secs = 5;
        let cb = cfg.circuit_breaker();
        assert_eq!(cb.failure_threshold, 3);
        assert_eq!(cb.timeout, Duration::from_secs(5));
        assert_eq!(cb.success_threshold, 2);
    }
}
