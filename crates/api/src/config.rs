//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::{CommerceConfig, PaymentGatewayConfig, SweeperConfig};

/// Full service configuration, assembled once at startup and passed down by
/// value. No component reads the environment on its own.
///
/// Environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `DATABASE_URL` — Postgres connection string (in-memory store if unset)
/// - `COMMERCE_BASE_URL`, `COMMERCE_CLIENT_ID`, `COMMERCE_ACCESS_TOKEN`
/// - `PAYMENT_BASE_URL`, `PAYMENT_ACCOUNT_ID`, `PAYMENT_API_KEY`
/// - `COLLABORATOR_TIMEOUT_SECS` — per-request HTTP timeout (default: 10)
/// - `SWEEP_INTERVAL_SECS` — sweeper schedule (default: 120)
/// - `RESERVATION_GRACE_SECS` — reservation lifetime (default: 300)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub commerce: CommerceConfig,
    pub payment: PaymentGatewayConfig,
    pub sweeper: SweeperConfig,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_secs(key: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default),
    )
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let timeout = env_secs("COLLABORATOR_TIMEOUT_SECS", 10);

        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            database_url: std::env::var("DATABASE_URL").ok(),
            commerce: CommerceConfig {
                base_url: env_or("COMMERCE_BASE_URL", "https://api.bigcommerce.example"),
                client_id: env_or("COMMERCE_CLIENT_ID", ""),
                access_token: env_or("COMMERCE_ACCESS_TOKEN", ""),
                timeout,
            },
            payment: PaymentGatewayConfig {
                base_url: env_or("PAYMENT_BASE_URL", "https://api.paysafe.example"),
                account_id: env_or("PAYMENT_ACCOUNT_ID", ""),
                api_key: env_or("PAYMENT_API_KEY", ""),
                timeout,
            },
            sweeper: SweeperConfig {
                interval: env_secs("SWEEP_INTERVAL_SECS", 120),
                grace: env_secs("RESERVATION_GRACE_SECS", 300),
            },
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
