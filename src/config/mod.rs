use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub orders: OrderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Whether cookies should carry the `Secure` flag.
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub session_duration_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrderConfig {
    /// How long a customer has to submit payment proof before the order is
    /// cancelled and its stock released.
    pub payment_window_minutes: i64,
    /// Upper bound on the background cancellation of one expired order.
    pub expiration_timeout_secs: u64,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            payment_window_minutes: 120,
            expiration_timeout_secs: 10,
        }
    }
}

impl OrderConfig {
    pub fn payment_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.payment_window_minutes)
    }

    pub fn expiration_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.expiration_timeout_secs)
    }
}

fn default_uploads_dir() -> String {
    "uploads".to_string()
}

fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://storefront.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("auth.session_duration_hours", 24)?
            .set_default("orders.payment_window_minutes", 120)?
            .set_default("orders.expiration_timeout_secs", 10)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with STOREFRONT__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("STOREFRONT").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
                uploads_dir: default_uploads_dir(),
                max_upload_bytes: default_max_upload_bytes(),
            },
            database: DatabaseConfig {
                url: "sqlite://storefront.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                session_duration_hours: 24,
            },
            orders: OrderConfig::default(),
        }
    }
}
