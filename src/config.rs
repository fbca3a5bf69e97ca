use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL.
    pub database_url: String,

    /// Server host address.
    pub host: String,

    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment.
    pub environment: String,

    /// Logging level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging).
    #[serde(default)]
    pub log_json: bool,

    /// Whether to sync the database schema on startup.
    #[serde(default)]
    pub auto_migrate: bool,

    /// JWT secret shared with the identity provider that issues tokens.
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Razorpay API key id (public, echoed to the payment widget).
    #[serde(default)]
    pub razorpay_key_id: String,

    /// Razorpay API key secret; also keys the payment-signature HMAC.
    #[serde(default)]
    pub razorpay_key_secret: String,

    /// Razorpay webhook secret. Independently keyed from the payment
    /// signature so compromise of one does not compromise the other.
    #[serde(default)]
    pub razorpay_webhook_secret: String,

    /// Razorpay API base URL (overridden in tests).
    #[serde(default = "default_razorpay_base_url")]
    pub razorpay_base_url: String,

    /// Timeout for outbound gateway calls, in seconds.
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,

    /// Outbound notification sink; unset disables dispatch.
    #[serde(default)]
    pub notification_url: Option<String>,

    /// Settlement currency (ISO code).
    #[serde(default = "default_currency")]
    pub currency: String,

    /// DB pool: max connections.
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections.
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds).
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
}

fn default_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_razorpay_base_url() -> String {
    "https://api.razorpay.com".to_string()
}
fn default_gateway_timeout_secs() -> u64 {
    10
}
fn default_currency() -> String {
    "INR".to_string()
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
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration load error: {0}")]
    Load(#[from] ConfigError),
    #[error("configuration validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads configuration from `config/{default,<env>}.toml` with `APP__`
/// environment-variable overrides layered on top.
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

    // jwt_secret has no default; it must come from a config file or the
    // environment so an insecure fallback can never reach production.
    let builder = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8080)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET to the secret shared with the identity provider.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    if app_config.razorpay_key_id.is_empty() || app_config.razorpay_key_secret.is_empty() {
        warn!("Razorpay credentials are not configured; online payment will fail at the gateway");
    }
    if app_config.razorpay_webhook_secret.is_empty() {
        warn!("Razorpay webhook secret is not configured; webhook deliveries will be rejected");
    }

    Ok(app_config)
}

/// Initializes the tracing subscriber. `RUST_LOG` wins over the configured
/// level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("storefront_api={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::try_new(filter_directive)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}
