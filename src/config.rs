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
const DEFAULT_LOCK_NAMESPACE: &str = "saferpay:lock";
const DEFAULT_LOCK_TTL_SECS: u64 = 300;
const DEFAULT_RETURN_WAIT_SECS: u64 = 30;

/// Saferpay gateway configuration.
///
/// Mirrors the option surface of the Saferpay backoffice: JSON API basic
/// auth credentials, customer/terminal ids, and the PaymentPage behavior
/// toggles.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SaferpayConfig {
    /// Customer ID from the Saferpay backoffice (Settings > Terminals)
    #[validate(length(min = 1))]
    pub customer_id: String,

    /// Terminal ID, also listed as Contract number in the backoffice
    #[validate(length(min = 1))]
    pub terminal_id: String,

    /// Username for JSON API basic authentication
    #[validate(length(min = 1))]
    pub username: String,

    /// Password for JSON API basic authentication
    #[validate(length(min = 1))]
    pub password: String,

    /// Template for the order identifier sent to the gateway
    /// ({order_number} and {order_id} placeholders)
    #[serde(default = "default_order_identifier")]
    pub order_identifier: String,

    /// Template for the order description shown on the payment page
    #[serde(default = "default_order_description")]
    pub order_description: String,

    /// Finalize payments automatically by capturing the transaction
    #[serde(default = "default_true_bool")]
    pub autocomplete: bool,

    /// Output more verbose debug logs for each provider call
    #[serde(default)]
    pub debug: bool,

    /// Request a reusable alias during initialization (requires Saferpay
    /// support to enable it on the account); the alias is only exposed to
    /// assert observers, never consumed here
    #[serde(default)]
    pub request_alias: bool,

    /// Allowed payment methods; empty means all methods are allowed
    #[serde(default)]
    #[validate(custom = "validate_payment_methods")]
    pub payment_methods: Vec<String>,

    /// Gateway mode: "test" or "live"
    #[serde(default = "default_mode")]
    #[validate(custom = "validate_mode")]
    pub mode: String,
}

impl SaferpayConfig {
    pub fn is_test(&self) -> bool {
        self.mode != "live"
    }

    pub fn is_live(&self) -> bool {
        self.mode == "live"
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Redis connection URL (reconciliation lock backend)
    pub redis_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Absolute base URL of this deployment, used to build the notification
    /// URL handed to the gateway (e.g. "https://shop.example.com")
    #[validate(url)]
    pub public_base_url: String,

    /// Namespace for reconciliation lock keys in Redis
    #[serde(default = "default_lock_namespace")]
    pub lock_namespace: String,

    /// Safety lease for Redis lock keys (seconds); a crashed holder cannot
    /// wedge an order past this bound
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,

    /// Bounded wait for the browser-return entry when a notification
    /// reconciliation is in flight (seconds)
    #[serde(default = "default_return_wait_secs")]
    pub return_wait_secs: u64,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
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

    /// Saferpay gateway settings
    #[validate]
    pub saferpay: SaferpayConfig,
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_true_bool() -> bool {
    true
}

fn default_mode() -> String {
    "test".to_string()
}

fn default_order_identifier() -> String {
    "{order_number}".to_string()
}

fn default_order_description() -> String {
    "Order {order_number}".to_string()
}

fn default_lock_namespace() -> String {
    DEFAULT_LOCK_NAMESPACE.to_string()
}

fn default_lock_ttl_secs() -> u64 {
    DEFAULT_LOCK_TTL_SECS
}

fn default_return_wait_secs() -> u64 {
    DEFAULT_RETURN_WAIT_SECS
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

fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn validate_mode(mode: &str) -> Result<(), ValidationError> {
    if mode == "test" || mode == "live" {
        Ok(())
    } else {
        let mut err = ValidationError::new("mode");
        err.message = Some("mode must be \"test\" or \"live\"".into());
        Err(err)
    }
}

fn validate_payment_methods(methods: &Vec<String>) -> Result<(), ValidationError> {
    for method in methods {
        if !crate::saferpay::types::is_known_payment_method(method) {
            let mut err = ValidationError::new("payment_methods");
            err.message = Some(format!("unknown Saferpay payment method: {}", method).into());
            return Err(err);
        }
    }
    Ok(())
}

/// Configuration loading/validation failures
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
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

    let builder = Config::builder()
        .set_default("database_url", "sqlite://saferpay_gateway.db?mode=rwc")?
        .set_default("redis_url", "redis://localhost:6379")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("public_base_url", "http://localhost:8080")?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // NOTE: the Saferpay credentials have no defaults - they MUST come from a
    // config file or environment variables. Fail with an actionable message
    // instead of an opaque deserialization error.
    for key in [
        "saferpay.customer_id",
        "saferpay.terminal_id",
        "saferpay.username",
        "saferpay.password",
    ] {
        if config.get_string(key).is_err() {
            let env_key = format!("APP__{}", key.replace('.', "__").to_uppercase());
            error!(
                "Saferpay credential '{}' is not configured. Set the {} environment variable \
                 or add it to config/{}.toml (Saferpay backoffice > Settings > JSON API basic authentication).",
                key, env_key, run_env
            );
            return Err(AppConfigError::Load(ConfigError::NotFound(format!(
                "{} is required but not configured",
                key
            ))));
        }
    }

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;

    info!(
        mode = %app_config.saferpay.mode,
        autocomplete = app_config.saferpay.autocomplete,
        "Configuration loaded"
    );

    Ok(app_config)
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` overrides the configured level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("saferpay_gateway={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saferpay_config() -> SaferpayConfig {
        SaferpayConfig {
            customer_id: "123456".to_string(),
            terminal_id: "17999999".to_string(),
            username: "API_123456_99999999".to_string(),
            password: "secret".to_string(),
            order_identifier: default_order_identifier(),
            order_description: default_order_description(),
            autocomplete: true,
            debug: false,
            request_alias: false,
            payment_methods: vec![],
            mode: "test".to_string(),
        }
    }

    #[test]
    fn test_mode_is_the_default() {
        let cfg = saferpay_config();
        assert!(cfg.is_test());
        assert!(!cfg.is_live());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_mode() {
        let mut cfg = saferpay_config();
        cfg.mode = "sandbox".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unknown_payment_method() {
        let mut cfg = saferpay_config();
        cfg.payment_methods = vec!["VISA".to_string(), "NOT_A_METHOD".to_string()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn accepts_known_payment_methods() {
        let mut cfg = saferpay_config();
        cfg.payment_methods = vec!["VISA".to_string(), "TWINT".to_string()];
        assert!(cfg.validate().is_ok());
    }
}
