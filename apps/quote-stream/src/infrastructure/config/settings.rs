//! Client Configuration Settings
//!
//! Configuration types for the quote stream client, loaded from environment
//! variables.

use std::time::Duration;

use crate::domain::streaming::{Symbol, SymbolError};
use crate::infrastructure::gateway::client::{AuthToken, DEFAULT_PING_INTERVAL, StreamConfig};
use crate::infrastructure::gateway::reconnect::ReconnectConfig;

/// Reconnection settings.
#[derive(Debug, Clone)]
pub struct ReconnectSettings {
    /// Base delay; attempt `n` waits `base * n`.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Jitter fraction (0 disables).
    pub jitter_factor: f64,
    /// Maximum reconnection attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.0,
            max_attempts: 5,
        }
    }
}

impl From<ReconnectSettings> for ReconnectConfig {
    fn from(settings: ReconnectSettings) -> Self {
        Self {
            base_delay: settings.base_delay,
            max_delay: settings.max_delay,
            jitter_factor: settings.jitter_factor,
            max_attempts: settings.max_attempts,
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Gateway WebSocket endpoint.
    pub url: String,
    /// Optional bearer token for the auth frame.
    pub token: Option<AuthToken>,
    /// Symbols the watch binary subscribes to at startup.
    pub watch_symbols: Vec<Symbol>,
    /// Interval between application-level pings.
    pub ping_interval: Duration,
    /// Reconnection settings.
    pub reconnect: ReconnectSettings,
}

impl Settings {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `NAPS_STREAM_URL` is missing or empty, or if
    /// `NAPS_WATCH_SYMBOLS` contains an invalid symbol.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("NAPS_STREAM_URL")
            .map_err(|_| ConfigError::MissingEnvVar("NAPS_STREAM_URL".to_string()))?;

        if url.is_empty() {
            return Err(ConfigError::EmptyValue("NAPS_STREAM_URL".to_string()));
        }

        let token = std::env::var("NAPS_STREAM_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .map(AuthToken::new);

        let watch_symbols = std::env::var("NAPS_WATCH_SYMBOLS")
            .map_or_else(|_| Ok(Vec::new()), |raw| parse_watch_symbols(&raw))?;

        let ping_interval =
            parse_env_duration_secs("NAPS_STREAM_PING_INTERVAL_SECS", DEFAULT_PING_INTERVAL);

        let defaults = ReconnectSettings::default();
        let reconnect = ReconnectSettings {
            base_delay: parse_env_duration_millis(
                "NAPS_STREAM_RECONNECT_BASE_MS",
                defaults.base_delay,
            ),
            max_delay: parse_env_duration_secs(
                "NAPS_STREAM_RECONNECT_MAX_SECS",
                defaults.max_delay,
            ),
            jitter_factor: parse_env_f64("NAPS_STREAM_RECONNECT_JITTER", defaults.jitter_factor),
            max_attempts: parse_env_u32(
                "NAPS_STREAM_MAX_RECONNECT_ATTEMPTS",
                defaults.max_attempts,
            ),
        };

        Ok(Self {
            url,
            token,
            watch_symbols,
            ping_interval,
            reconnect,
        })
    }

    /// Build the gateway connection configuration.
    #[must_use]
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            url: self.url.clone(),
            token: self.token.clone(),
            reconnect: self.reconnect.clone().into(),
            ping_interval: self.ping_interval,
        }
    }
}

/// Parse a comma-separated watchlist into symbols.
fn parse_watch_symbols(raw: &str) -> Result<Vec<Symbol>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| Symbol::new(part).map_err(ConfigError::from))
        .collect()
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// A watchlist entry is not a usable symbol.
    #[error("invalid watch symbol: {0}")]
    InvalidSymbol(#[from] SymbolError),
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
