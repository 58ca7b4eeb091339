use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub otp: OtpConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub sms: SmsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OtpConfig {
    /// Validity window of an issued code, in seconds.
    pub ttl_secs: i64,
    pub max_attempts: i32,
    pub resend_max: i32,
    /// Minimum gap between resends (measured from issue or last resend).
    pub resend_min_interval_secs: i64,
    /// How often the background sweep fails stale pending payments.
    pub sweep_interval_secs: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            max_attempts: 5,
            resend_max: 3,
            resend_min_interval_secs: 60,
            sweep_interval_secs: 60,
        }
    }
}

impl OtpConfig {
    /// Sweep period, clamped to at least one second: a zero period would
    /// panic the interval timer at startup.
    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    /// PHP per USD used to convert listed plan prices to the charge amount.
    pub php_per_usd: f64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9090".to_string(),
            api_key: String::new(),
            php_per_usd: 56.0,
            max_attempts: 3,
            backoff_base_ms: 500,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmsConfig {
    pub base_url: String,
    pub api_key: String,
    pub sender_name: String,
    pub request_timeout_secs: u64,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9091".to_string(),
            api_key: String::new(),
            sender_name: "GYMPAY".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (with GYMPAY__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("GYMPAY").separator("__"))
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
            },
            database: DatabaseConfig {
                url: "sqlite://gympay.db".to_string(),
                max_connections: 10,
            },
            otp: OtpConfig::default(),
            gateway: GatewayConfig::default(),
            sms: SmsConfig::default(),
        }
    }
}
