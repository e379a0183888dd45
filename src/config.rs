use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "MXN";
const MERCADOPAGO_API_URL: &str = "https://api.mercadopago.com";
const DEFAULT_CART_PATH: &str = "/checkout/cart";
const DEFAULT_SUCCESS_PATH: &str = "/checkout/success";

/// MercadoPago payment-method settings, the same surface the store admin
/// manages: activation flag, credentials and the display strings shown at
/// checkout.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct MercadoPagoSettings {
    /// Whether the payment method is offered at checkout
    #[serde(default)]
    pub active: bool,

    /// Private API credential, required for every gateway call
    #[serde(default)]
    pub access_token: String,

    /// Public credential, used by the storefront checkout widget
    #[serde(default)]
    pub public_key: String,

    /// Method title shown to the buyer
    #[serde(default = "default_mp_title")]
    pub title: String,

    /// Method description shown to the buyer
    #[serde(default)]
    pub description: String,

    /// Gateway REST API base URL (overridable for sandboxes and tests)
    #[serde(default = "default_mp_api_url")]
    #[validate(url)]
    pub api_url: String,
}

impl MercadoPagoSettings {
    /// True when the server-side credential is present. Checked before any
    /// gateway call is attempted.
    pub fn has_credentials(&self) -> bool {
        !self.access_token.trim().is_empty()
    }
}

impl Default for MercadoPagoSettings {
    fn default() -> Self {
        Self {
            active: false,
            access_token: String::new(),
            public_key: String::new(),
            title: default_mp_title(),
            description: String::new(),
            api_url: default_mp_api_url(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_env")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Public base URL of the storefront. Its scheme decides whether the
    /// webhook URL and auto_return are sent to the gateway (sandboxes reject
    /// both over plain http).
    #[validate(url)]
    pub app_url: String,

    /// Storefront path the buyer is sent back to on any failure
    #[serde(default = "default_cart_path")]
    pub cart_path: String,

    /// Storefront path the buyer lands on after a confirmed payment
    #[serde(default = "default_success_path")]
    pub success_path: String,

    /// Currency applied when an order carries none
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB connect timeout (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// MercadoPago payment-method settings
    #[serde(default)]
    #[validate]
    pub mercadopago: MercadoPagoSettings,
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Secure-transport policy gate: webhook notifications and auto_return
    /// are only announced to the gateway when the storefront is on https.
    pub fn is_secure_transport(&self) -> bool {
        self.app_url.starts_with("https://")
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}{}", self.app_url.trim_end_matches('/'), path)
    }

    /// Cart view the buyer is redirected back to with an error message
    pub fn cart_url(&self) -> String {
        self.public_url(&self.cart_path)
    }

    /// Order-success view
    pub fn success_url(&self) -> String {
        self.public_url(&self.success_path)
    }

    /// Shared back_url for all three gateway outcomes; the gateway encodes
    /// the actual outcome in the return query parameters.
    pub fn return_url(&self) -> String {
        self.public_url("/mercadopago/return")
    }

    /// Gateway-initiated notification endpoint
    pub fn webhook_url(&self) -> String {
        self.public_url("/mercadopago/webhook")
    }

    /// Entry point the storefront sends the buyer to for this method
    pub fn redirect_url(&self) -> String {
        self.public_url("/mercadopago/redirect")
    }
}

/// Loads configuration from `config/default`, an environment-specific file
/// selected by `APP_ENV`, and `APP__`-prefixed environment variables, in that
/// order of precedence.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let cfg: AppConfig = Config::builder()
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;

    cfg.validate()
        .map_err(|e| ConfigError::Message(e.to_string()))?;

    Ok(cfg)
}

/// Initializes the tracing subscriber. `RUST_LOG` wins when set, otherwise
/// the configured level applies to this crate with tower_http at debug.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("mercadopago_checkout={level},tower_http=debug");
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

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_env() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_cart_path() -> String {
    DEFAULT_CART_PATH.to_string()
}

fn default_success_path() -> String {
    DEFAULT_SUCCESS_PATH.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_mp_title() -> String {
    "Mercado Pago".to_string()
}

fn default_mp_api_url() -> String {
    MERCADOPAGO_API_URL.to_string()
}

/// Config fixture for unit tests across the crate.
#[cfg(test)]
pub(crate) fn test_config(app_url: &str) -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: default_host(),
        port: default_port(),
        environment: default_env(),
        log_level: default_log_level(),
        log_json: false,
        app_url: app_url.to_string(),
        cart_path: default_cart_path(),
        success_path: default_success_path(),
        default_currency: default_currency(),
        db_max_connections: default_db_max_connections(),
        db_connect_timeout_secs: default_db_connect_timeout_secs(),
        mercadopago: MercadoPagoSettings::default(),
    }
}
