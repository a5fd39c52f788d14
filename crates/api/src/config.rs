//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::{DEFAULT_TRANSACTION_TIMEOUT, DeletePolicy, InvoiceServiceConfig};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; the in-memory store is used when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `TRANSACTION_TIMEOUT_MS`: upper bound on invoice transactions (default: `10000`)
/// - `INVOICE_DELETE_POLICY`: `retain` (default) or `reverse-stock`
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub transaction_timeout: Duration,
    pub delete_policy: DeletePolicy,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from `lookup`, which returns the raw value of a
    /// variable. Unparseable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.database_max_connections),
            transaction_timeout: lookup("TRANSACTION_TIMEOUT_MS")
                .and_then(|ms| ms.parse().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.transaction_timeout),
            delete_policy: lookup("INVOICE_DELETE_POLICY")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.delete_policy),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settings for the invoice service.
    pub fn invoice_service(&self) -> InvoiceServiceConfig {
        InvoiceServiceConfig {
            transaction_timeout: self.transaction_timeout,
            delete_policy: self.delete_policy,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
            delete_policy: DeletePolicy::default(),
        }
    }
}
