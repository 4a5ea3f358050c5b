//! Application configuration loaded from environment variables.
//!
//! All configuration is loaded from environment variables with defaults
//! suitable for local development. A `.env` file is honoured if present.
//!
//! # Access Control
//!
//! - `IP_WHITELIST`: Comma-separated CIDR ranges allowed through the gate
//!   (default: `127.0.0.0/8,::1/128`). Blank items are an error.
//! - `IP_WHITELIST_USE_HEADER`: Judge clients by `X-Forwarded-For` /
//!   `X-Real-Ip` instead of the transport address (default: `false`).
//!   Only enable this behind a reverse proxy that sets these headers.
//!
//! # Server & Observability
//!
//! - `HOST`, `PORT`: Listen address (default: `0.0.0.0:3000`)
//! - `METRICS_PORT`: Prometheus listener port (default: 9090, 0 = disabled)
//! - `RUST_LOG`: Log filter (default: `info`)
//! - `LOG_FORMAT`: `text` or `json` (default: `text`)

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}' (expected 'text' or 'json')")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    // =========================================================================
    // Access Control Configuration
    // =========================================================================
    /// Allowed CIDR ranges, in configuration order.
    /// Blank items are kept so the whitelist rejects them when it is built.
    pub ip_whitelist: Vec<String>,

    /// Trust forwarding headers when resolving the client address
    pub whitelist_use_header: bool,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    /// Log output format
    pub log_format: LogFormat,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if a value cannot be parsed or the
    /// resulting configuration is inconsistent.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or(defaults.host),
            port: Self::parse_env("PORT", defaults.port)?,

            // Access control
            ip_whitelist: env::var("IP_WHITELIST")
                .map(|raw| Self::parse_whitelist(&raw))
                .unwrap_or(defaults.ip_whitelist),
            whitelist_use_header: Self::parse_bool_env(
                "IP_WHITELIST_USE_HEADER",
                defaults.whitelist_use_header,
            )?,

            // Observability
            log_level: env::var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: Self::parse_env("LOG_FORMAT", defaults.log_format)?,
            metrics_port: Self::parse_env("METRICS_PORT", defaults.metrics_port)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency.
    fn validate(&self) -> AppResult<()> {
        if self.metrics_enabled() && self.metrics_port == self.port {
            return Err(AppError::ConfigError(format!(
                "METRICS_PORT ({}) must differ from PORT ({})",
                self.metrics_port, self.port
            )));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_enabled()
            .then(|| SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse a boolean flag, accepting `true/false`, `1/0`, `yes/no`, `on/off`.
    fn parse_bool_env(name: &str, default: bool) -> AppResult<bool> {
        match env::var(name) {
            Ok(val) => Self::parse_bool(&val)
                .ok_or_else(|| AppError::ConfigError(format!("Invalid {name}: '{val}' is not a boolean"))),
            Err(_) => Ok(default),
        }
    }

    fn parse_bool(raw: &str) -> Option<bool> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        }
    }

    /// Split the comma-separated whitelist, trimming items.
    ///
    /// Blank items are not dropped: `10.0.0.0/8,,fe80::/16` must fail the
    /// same way it does when passed to
    /// [`IpWhitelist::new`](crate::whitelist::IpWhitelist::new) directly.
    fn parse_whitelist(raw: &str) -> Vec<String> {
        raw.split(',').map(|s| s.trim().to_string()).collect()
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 3000,
            // Access control - loopback only
            ip_whitelist: vec!["127.0.0.0/8".to_string(), "::1/128".to_string()],
            whitelist_use_header: false,
            // Observability
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_port: 9090,
        }
    }
}
