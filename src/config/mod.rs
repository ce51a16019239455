use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub stripe: StripeConfig,
    #[serde(default)]
    pub payments: PaymentConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity service that issues bearer tokens.
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    /// `{CHECKOUT_SESSION_ID}` is substituted by Stripe on redirect.
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    /// Platform fee in basis points (1000 = 10%).
    pub platform_fee_bps: u32,
    pub currency: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            platform_fee_bps: 1000,
            currency: "usd".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReconciliationConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// How long a succeeded payment may sit without a booking before the
    /// sweep materializes it.
    pub grace_period_secs: i64,
    /// Age after which pending/processing payments are re-checked with the provider.
    pub stale_after_secs: i64,
    pub batch_size: i64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            grace_period_secs: 120,
            stale_after_secs: 3600,
            batch_size: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 5,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://mentorbook.db")?
            .set_default("database.max_connections", 10)?
            .set_default("payments.platform_fee_bps", 1000)?
            .set_default("payments.currency", "usd")?
            .set_default("reconciliation.enabled", true)?
            .set_default("reconciliation.interval_secs", 300)?
            .set_default("reconciliation.grace_period_secs", 120)?
            .set_default("reconciliation.stale_after_secs", 3600)?
            .set_default("reconciliation.batch_size", 100)?
            .set_default("notifications.timeout_secs", 5)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with MENTORBOOK__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("MENTORBOOK").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}
