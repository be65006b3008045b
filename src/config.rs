//! Bot configuration
//!
//! Loaded from a TOML file with `COINWATCH_*` environment overrides,
//! e.g. `COINWATCH_TELEGRAM__BOT_TOKEN` overrides `[telegram] bot_token`.

use crate::error::Result;
use serde::Deserialize;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub coinmarketcap: FeedConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

/// Telegram Bot API credentials
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
}

/// CoinMarketCap API settings
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub api_key: String,
    #[serde(default = "default_feed_base_url")]
    pub base_url: String,
}

/// Tracking engine settings
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Seconds between price polls for an active tracking session
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Upper bound on a single price query, on top of the HTTP client timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Consecutive feed failures before the user is told tracking is degraded
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

fn default_feed_base_url() -> String {
    "https://pro-api.coinmarketcap.com".to_string()
}

fn default_poll_interval_secs() -> u64 {
    20
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_consecutive_failures() -> u32 {
    3
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

impl TrackerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file plus environment overrides.
    ///
    /// The file is optional so a fully env-configured deployment works.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("COINWATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
