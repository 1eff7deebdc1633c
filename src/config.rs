use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_DATABASE_URL: &str = "sqlite://floreria.db?mode=rwc";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";
const DEFAULT_SHOP_NAME: &str = "La Floreria";
const DEFAULT_MP_BASE_URL: &str = "https://api.mercadopago.com";
const DEFAULT_WHATSAPP_BASE_URL: &str = "https://graph.facebook.com/v19.0";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL. Storage is the one integration that must be
    /// reachable at startup; everything else fails at invocation time.
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
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default = "default_true_bool")]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Display name used in email copy and the assistant persona
    #[serde(default = "default_shop_name")]
    pub shop_name: String,

    /// Public base URL of the storefront (checkout return pages)
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    /// Public base URL of this API (gateway notification callback)
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Address that receives new-order alerts
    #[serde(default)]
    #[validate(email)]
    pub admin_email: Option<String>,

    /// Orders at or above this subtotal ship free (currency units)
    #[serde(default = "default_free_shipping_threshold")]
    pub free_shipping_threshold: u32,

    /// Flat shipping fee below the free-shipping threshold (currency units)
    #[serde(default = "default_shipping_fee")]
    pub shipping_fee: u32,

    // ========== Payment gateway ==========
    /// MercadoPago access token; checkout-session calls fail without it
    #[serde(default)]
    pub mp_access_token: Option<String>,

    /// Gateway API base URL (overridable for tests)
    #[serde(default = "default_mp_base_url")]
    pub mp_base_url: String,

    // ========== Inference ==========
    /// OpenAI API key; assistant replies fail without it
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Chat-completion model name
    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    /// Stored turns submitted per inference call (context window)
    #[serde(default = "default_chat_context_turns")]
    #[validate(range(min = 1))]
    pub chat_context_turns: u64,

    /// Output-length bound for assistant replies
    #[serde(default = "default_chat_max_tokens")]
    pub chat_max_tokens: u32,

    /// Fixed sampling temperature for assistant replies
    #[serde(default = "default_chat_temperature")]
    pub chat_temperature: f32,

    // ========== Messaging channel ==========
    /// WhatsApp Cloud API bearer token
    #[serde(default)]
    pub whatsapp_token: Option<String>,

    /// WhatsApp phone-number id used as the sender
    #[serde(default)]
    pub whatsapp_phone_id: Option<String>,

    /// Shared token echoed back during the channel verification handshake
    #[serde(default)]
    pub whatsapp_verify_token: Option<String>,

    /// Messaging API base URL (overridable for tests)
    #[serde(default = "default_whatsapp_base_url")]
    pub whatsapp_base_url: String,

    // ========== Outbound mail ==========
    #[serde(default)]
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub smtp_username: Option<String>,

    #[serde(default)]
    pub smtp_password: Option<String>,

    /// From address for all outbound mail
    #[serde(default)]
    #[validate(email)]
    pub smtp_from: Option<String>,
}

impl AppConfig {
    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Builds a config with every default applied on top of the given database
    /// URL. Used by tests and tooling that bypass the layered loader.
    pub fn with_defaults(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".to_string(),
            port: default_port(),
            environment: DEFAULT_ENV.to_string(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
            cors_allowed_origins: None,
            shop_name: default_shop_name(),
            frontend_url: default_frontend_url(),
            backend_url: default_backend_url(),
            admin_email: None,
            free_shipping_threshold: default_free_shipping_threshold(),
            shipping_fee: default_shipping_fee(),
            mp_access_token: None,
            mp_base_url: default_mp_base_url(),
            openai_api_key: None,
            openai_model: default_openai_model(),
            chat_context_turns: default_chat_context_turns(),
            chat_max_tokens: default_chat_max_tokens(),
            chat_temperature: default_chat_temperature(),
            whatsapp_token: None,
            whatsapp_phone_id: None,
            whatsapp_verify_token: None,
            whatsapp_base_url: default_whatsapp_base_url(),
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            smtp_from: None,
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

fn default_true_bool() -> bool {
    true
}

fn default_shop_name() -> String {
    DEFAULT_SHOP_NAME.to_string()
}

fn default_frontend_url() -> String {
    DEFAULT_FRONTEND_URL.to_string()
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_free_shipping_threshold() -> u32 {
    2000
}

fn default_shipping_fee() -> u32 {
    150
}

fn default_mp_base_url() -> String {
    DEFAULT_MP_BASE_URL.to_string()
}

fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.to_string()
}

fn default_chat_context_turns() -> u64 {
    20
}

fn default_chat_max_tokens() -> u32 {
    300
}

fn default_chat_temperature() -> f32 {
    0.7
}

fn default_whatsapp_base_url() -> String {
    DEFAULT_WHATSAPP_BASE_URL.to_string()
}

fn default_smtp_port() -> u16 {
    587
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("floreria_api={},tower_http=debug", level);
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

    let builder = Config::builder()
        .set_default("database_url", DEFAULT_DATABASE_URL)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
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

    #[test]
    fn defaults_cover_pricing_policy() {
        let cfg = AppConfig::with_defaults("sqlite::memory:");
        assert_eq!(cfg.free_shipping_threshold, 2000);
        assert_eq!(cfg.shipping_fee, 150);
        assert_eq!(cfg.chat_context_turns, 20);
    }

    #[test]
    fn integration_credentials_default_to_absent() {
        let cfg = AppConfig::with_defaults("sqlite::memory:");
        assert!(cfg.mp_access_token.is_none());
        assert!(cfg.openai_api_key.is_none());
        assert!(cfg.whatsapp_token.is_none());
        assert!(cfg.smtp_host.is_none());
    }

    #[test]
    fn admin_email_is_validated() {
        let mut cfg = AppConfig::with_defaults("sqlite::memory:");
        cfg.admin_email = Some("not-an-address".into());
        assert!(cfg.validate().is_err());

        cfg.admin_email = Some("owner@floreria.example".into());
        assert!(cfg.validate().is_ok());
    }
}
