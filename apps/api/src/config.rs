//! # API Configuration
//!
//! Layered with the `config` crate:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ 1. built-in defaults        (set_default below)              │
//! │ 2. shopdesk.toml            (optional, working directory)    │
//! │ 3. SHOPDESK_* environment   (SHOPDESK_AUTH__JWT_SECRET=...)  │
//! │ 4. STOCK_POLICY, LOG_FORMAT (plain env overrides)            │
//! └──────────────────────────────────────────────────────────────┘
//!          later layers win; `.env` is loaded into the
//!          environment by `main` before any of this runs
//! ```
//!
//! Secrets come out as [`SecretString`] and are only exposed where used.
//! The SMTP, PayPal and bootstrap-admin sections are optional; when absent
//! the corresponding feature degrades (log-only mail, 503 for payments).

use config::{Config, ConfigBuilder, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use shopdesk_core::money::Money;
use shopdesk_core::pricing::{PricingPolicy, TaxRate};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::events::StockPolicy;

/// Development JWT secret. Accepted only so a fresh checkout starts; a
/// warning is logged whenever it is in use.
pub const DEV_JWT_SECRET: &str = "shopdesk-dev-secret-change-in-production";

const MIN_JWT_SECRET_LEN: usize = 32;

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub pricing: PricingPolicy,
    pub stock_policy: StockPolicy,
    pub log_format: LogFormat,
    pub storage: StorageConfig,
    pub smtp: Option<SmtpConfig>,
    pub paypal: Option<PaypalConfig>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                key: "server.host".to_string(),
                reason: e.to_string(),
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:`
    pub path: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: SecretString,
    pub access_token_secs: i64,
    pub refresh_token_secs: i64,
    /// Adds `Secure` to the refresh cookie. Off for plain-HTTP development.
    pub cookie_secure: bool,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per bucket
    pub root: PathBuf,
    pub bucket: String,
    pub signing_key: SecretString,
    pub url_ttl: Duration,
    /// Prefix for presigned URLs, e.g. `https://shop.example.com`
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub struct PaypalConfig {
    /// `https://api-m.sandbox.paypal.com` or the live endpoint
    pub base_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub currency: String,
    pub return_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: SecretString,
    pub email: Option<String>,
}

// =============================================================================
// Raw (deserialized) shape
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawConfig {
    server: ServerConfig,
    database: DatabaseConfig,
    auth: RawAuth,
    pricing: RawPricing,
    stock_policy: StockPolicy,
    log_format: LogFormat,
    storage: RawStorage,
    smtp: Option<RawSmtp>,
    paypal: Option<RawPaypal>,
    bootstrap_admin: Option<RawBootstrapAdmin>,
}

#[derive(Debug, Deserialize)]
struct RawAuth {
    jwt_secret: String,
    access_token_secs: i64,
    refresh_token_secs: i64,
    cookie_secure: bool,
}

#[derive(Debug, Deserialize)]
struct RawPricing {
    vat_bps: u32,
    free_shipping_threshold_cents: i64,
    shipping_fee_cents: i64,
}

#[derive(Debug, Deserialize)]
struct RawStorage {
    root: PathBuf,
    bucket: String,
    signing_key: String,
    url_ttl_secs: u64,
    public_base_url: String,
}

#[derive(Debug, Deserialize)]
struct RawSmtp {
    host: String,
    #[serde(default = "default_smtp_port")]
    port: u16,
    username: String,
    password: String,
    from_address: String,
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Deserialize)]
struct RawPaypal {
    base_url: String,
    client_id: String,
    client_secret: String,
    #[serde(default = "default_currency")]
    currency: String,
    return_url: String,
    cancel_url: String,
}

fn default_currency() -> String {
    "EUR".to_string()
}

#[derive(Debug, Deserialize)]
struct RawBootstrapAdmin {
    username: String,
    password: String,
    email: Option<String>,
}

// =============================================================================
// Loading
// =============================================================================

impl AppConfig {
    /// Load configuration from defaults, `shopdesk.toml` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("shopdesk").required(false))
            .add_source(
                Environment::with_prefix("SHOPDESK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("stock_policy", std::env::var("STOCK_POLICY").ok())?
            .set_override_option("log_format", std::env::var("LOG_FORMAT").ok())?;

        Self::from_builder(builder)
    }

    /// Resolves a builder on top of the built-in defaults. Tests pass a bare
    /// `Config::builder()` (plus overrides) to get a deterministic config.
    pub fn from_builder(
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let raw: RawConfig = with_defaults(builder)?.build()?.try_deserialize()?;
        let config = AppConfig::try_from(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// True when the development JWT secret is in use.
    pub fn uses_dev_secret(&self) -> bool {
        self.auth.jwt_secret.expose_secret() == DEV_JWT_SECRET
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let secret = self.auth.jwt_secret.expose_secret();
        if secret != DEV_JWT_SECRET && secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::InvalidValue {
                key: "auth.jwt_secret".to_string(),
                reason: format!("must be at least {MIN_JWT_SECRET_LEN} bytes"),
            });
        }

        for (key, value) in [
            ("auth.access_token_secs", self.auth.access_token_secs),
            ("auth.refresh_token_secs", self.auth.refresh_token_secs),
        ] {
            if value <= 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        }

        if self.pricing.shipping_fee.is_negative() || self.pricing.free_shipping_threshold.is_negative()
        {
            return Err(ConfigError::InvalidValue {
                key: "pricing".to_string(),
                reason: "amounts must not be negative".to_string(),
            });
        }

        Ok(())
    }
}

fn with_defaults(
    builder: ConfigBuilder<config::builder::DefaultState>,
) -> Result<ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
    builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("database.path", "./shopdesk.db")?
        .set_default("database.max_connections", 10)?
        .set_default("auth.jwt_secret", DEV_JWT_SECRET)?
        .set_default("auth.access_token_secs", 900)?
        .set_default("auth.refresh_token_secs", 7 * 24 * 3600)?
        .set_default("auth.cookie_secure", false)?
        .set_default("pricing.vat_bps", 2000)?
        .set_default("pricing.free_shipping_threshold_cents", 5000)?
        .set_default("pricing.shipping_fee_cents", 500)?
        .set_default("stock_policy", "lenient")?
        .set_default("log_format", "pretty")?
        .set_default("storage.root", "./data/objects")?
        .set_default("storage.bucket", "product-images")?
        .set_default("storage.signing_key", "shopdesk-dev-signing-key")?
        .set_default("storage.url_ttl_secs", 3600)?
        .set_default("storage.public_base_url", "http://localhost:8080")
}

impl TryFrom<RawConfig> for AppConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        Ok(AppConfig {
            server: raw.server,
            database: raw.database,
            auth: AuthConfig {
                jwt_secret: SecretString::from(raw.auth.jwt_secret),
                access_token_secs: raw.auth.access_token_secs,
                refresh_token_secs: raw.auth.refresh_token_secs,
                cookie_secure: raw.auth.cookie_secure,
            },
            pricing: PricingPolicy {
                vat_rate: TaxRate::from_bps(raw.pricing.vat_bps),
                free_shipping_threshold: Money::from_cents(raw.pricing.free_shipping_threshold_cents),
                shipping_fee: Money::from_cents(raw.pricing.shipping_fee_cents),
            },
            stock_policy: raw.stock_policy,
            log_format: raw.log_format,
            storage: StorageConfig {
                root: raw.storage.root,
                bucket: raw.storage.bucket,
                signing_key: SecretString::from(raw.storage.signing_key),
                url_ttl: Duration::from_secs(raw.storage.url_ttl_secs),
                public_base_url: raw.storage.public_base_url.trim_end_matches('/').to_string(),
            },
            smtp: raw.smtp.map(|s| SmtpConfig {
                host: s.host,
                port: s.port,
                username: s.username,
                password: SecretString::from(s.password),
                from_address: s.from_address,
            }),
            paypal: raw.paypal.map(|p| PaypalConfig {
                base_url: p.base_url.trim_end_matches('/').to_string(),
                client_id: p.client_id,
                client_secret: SecretString::from(p.client_secret),
                currency: p.currency,
                return_url: p.return_url,
                cancel_url: p.cancel_url,
            }),
            bootstrap_admin: raw.bootstrap_admin.map(|b| BootstrapAdmin {
                username: b.username,
                password: SecretString::from(b.password),
                email: b.email,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_builder(Config::builder()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.access_token_secs, 900);
        assert_eq!(config.pricing, PricingPolicy::default());
        assert_eq!(config.stock_policy, StockPolicy::Lenient);
        assert!(config.smtp.is_none());
        assert!(config.paypal.is_none());
        assert!(config.uses_dev_secret());
    }

    #[test]
    fn test_short_secret_rejected() {
        let builder = Config::builder()
            .set_override("auth.jwt_secret", "too-short")
            .unwrap();
        let err = AppConfig::from_builder(builder).unwrap_err();
        assert!(err.to_string().contains("auth.jwt_secret"));
    }

    #[test]
    fn test_overrides_and_optional_sections() {
        let builder = Config::builder()
            .set_override("pricing.shipping_fee_cents", 0)
            .unwrap()
            .set_override("stock_policy", "strict")
            .unwrap()
            .set_override("smtp.host", "smtp.example.com")
            .unwrap()
            .set_override("smtp.username", "mailer")
            .unwrap()
            .set_override("smtp.password", "pw")
            .unwrap()
            .set_override("smtp.from_address", "shop@example.com")
            .unwrap();

        let config = AppConfig::from_builder(builder).unwrap();
        assert!(config.pricing.shipping_fee.is_zero());
        assert_eq!(config.stock_policy, StockPolicy::Strict);
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.password.expose_secret(), "pw");
    }

    #[test]
    fn test_non_positive_lifetime_rejected() {
        let builder = Config::builder()
            .set_override("auth.access_token_secs", 0)
            .unwrap();
        assert!(AppConfig::from_builder(builder).is_err());
    }
}
