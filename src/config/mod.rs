pub mod preferences;
pub use preferences::{new_shared_preferences, Preferences, SharedPreferences};

use crate::realtime::ReconnectPolicy;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Complete client configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourierConfig {
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub preferences: Preferences,
}

/// Realtime (WebSocket) endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Endpoint without the token query parameter
    #[serde(default = "default_ws_url")]
    pub url: String,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

fn default_ws_url() -> String {
    std::env::var("COURIER_WS_URL").unwrap_or_else(|_| "ws://localhost:3001".to_string())
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: default_ws_url(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Reconnect behaviour after the connection closes.
///
/// `strategy = "fixed"` retries every `delay_ms`; `"exponential"` multiplies
/// the delay by `multiplier` per attempt up to `max_delay_ms`. `max_attempts`
/// caps consecutive failed attempts; absent means retry forever.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_strategy() -> String {
    "fixed".to_string()
}

fn default_delay_ms() -> u64 {
    5000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            delay_ms: default_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    /// Build the reconnect policy described by this section
    pub fn to_policy(&self) -> Result<ReconnectPolicy> {
        if self.delay_ms == 0 {
            bail!("reconnect delay_ms must be greater than 0");
        }
        let delay = Duration::from_millis(self.delay_ms);
        let policy = match self.strategy.as_str() {
            "fixed" => ReconnectPolicy::fixed(delay),
            "exponential" => {
                if self.multiplier < 1.0 {
                    bail!("reconnect multiplier must be >= 1.0, got {}", self.multiplier);
                }
                ReconnectPolicy::exponential(
                    delay,
                    Duration::from_millis(self.max_delay_ms.max(self.delay_ms)),
                    self.multiplier,
                )
            }
            other => bail!("unknown reconnect strategy '{}'", other),
        };

        Ok(match self.max_attempts {
            Some(max) => policy.with_max_attempts(max),
            None => policy,
        })
    }
}

/// REST API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub base_url: String,
    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_api_url() -> String {
    std::env::var("COURIER_API_URL").unwrap_or_else(|_| "http://localhost:3001/api".to_string())
}

fn default_timeout_seconds() -> u64 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<CourierConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let config: CourierConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
    Ok(config)
}

/// Load configuration, using defaults when the file does not exist
pub fn load_or_default(path: impl AsRef<Path>) -> Result<CourierConfig> {
    let path = path.as_ref();
    if path.exists() {
        load_config(path)
    } else {
        Ok(CourierConfig::default())
    }
}
