use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEV_DEFAULT_JWT_SECRET: &str =
    "development_only_secret_key_that_is_at_least_32_characters_long";

/// Application configuration, loaded from `config/*.toml` plus `APP__`
/// environment overrides and validated at startup.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Redis connection URL
    pub redis_url: String,

    /// JWT signing secret (minimum 32 characters)
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// JWT expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment (development | test | production)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level filter
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB connect timeout (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// Startup connection attempts before giving up
    #[serde(default = "default_db_connect_retries")]
    pub db_connect_retries: u32,

    /// CORS: comma-separated allowed origins; permissive in development when unset
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Payment gateway secret key
    #[serde(default)]
    pub stripe_secret_key: Option<String>,

    /// Shared secret used to verify inbound payment webhooks
    #[serde(default)]
    pub stripe_webhook_secret: Option<String>,

    /// Webhook signature timestamp tolerance (seconds)
    #[serde(default = "default_webhook_tolerance_secs")]
    pub webhook_tolerance_secs: u64,

    /// When a refund should cancel the parent order: "full-refund" | "any-refund"
    #[serde(default = "default_refund_cancel_policy")]
    pub refund_cancel_policy: String,

    /// Cart entry lifetime in the cache (seconds)
    #[serde(default = "default_cart_ttl_secs")]
    pub cart_ttl_secs: u64,
}

fn default_jwt_expiration() -> u64 {
    // Four days, matching the session lifetime the storefront clients expect.
    4 * 24 * 3600
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
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
fn default_db_connect_retries() -> u32 {
    5
}
fn default_webhook_tolerance_secs() -> u64 {
    300
}
fn default_refund_cancel_policy() -> String {
    "full-refund".to_string()
}
fn default_cart_ttl_secs() -> u64 {
    48 * 3600
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }
}

/// Loads configuration from `config/default.toml`, `config/<env>.toml`
/// (optional) and `APP__*` environment variables, in that precedence order.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let env = std::env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder()
        .set_default("environment", env.clone())?
        .set_default("database_url", "postgres://localhost/storefront")?
        .set_default("redis_url", "redis://127.0.0.1:6379")?;

    if env == "development" || env == "test" {
        builder = builder.set_default("jwt_secret", DEV_DEFAULT_JWT_SECRET)?;
    }

    let default_file = Path::new(CONFIG_DIR).join("default.toml");
    if default_file.exists() {
        builder = builder.add_source(File::from(default_file));
    }
    let env_file = Path::new(CONFIG_DIR).join(format!("{env}.toml"));
    if env_file.exists() {
        builder = builder.add_source(File::from(env_file));
    }

    let cfg: AppConfig = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;

    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {e}")))?;

    info!(environment = %cfg.environment, "configuration loaded");
    Ok(cfg)
}

/// Initializes the global tracing subscriber. Safe to call once per process.
pub fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
