// src/config.rs

//! Manages relay configuration: loading, defaults, and validation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Settings for the console-side TCP session.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConsoleConfig {
    /// Hostname or IP of the lighting console.
    pub host: String,
    /// Telnet port of the console's remote-command interface.
    #[serde(default = "default_console_port")]
    pub port: u16,
    /// Username for the console login exchange.
    pub username: String,
    /// Password line, sent only if non-empty.
    #[serde(default)]
    pub password: String,
    /// How long to wait for the TCP handshake before giving up.
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    /// Delay after connecting before sending the login line, letting the
    /// console's banner and prompt drain first.
    #[serde(with = "humantime_serde", default = "default_settle_delay")]
    pub settle_delay: Duration,
    /// Minimum gap between consecutive outbound command writes, so bursts
    /// of operator commands do not overrun the console's line parser.
    #[serde(with = "humantime_serde", default = "default_pacing_interval")]
    pub pacing_interval: Duration,
}

/// Settings for the operator-facing WebSocket hub.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HubConfig {
    /// Port the WebSocket listener binds on (all interfaces).
    #[serde(default = "default_hub_port")]
    pub port: u16,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            port: default_hub_port(),
        }
    }
}

fn default_console_port() -> u16 {
    30000
}
fn default_hub_port() -> u16 {
    8181
}
fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_settle_delay() -> Duration {
    Duration::from_millis(200)
}
fn default_pacing_interval() -> Duration {
    Duration::from_millis(50)
}
fn default_log_level() -> String {
    "info".to_string()
}

/// The top-level configuration for the relay process.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub console: ConsoleConfig,
    #[serde(default)]
    pub hub: HubConfig,
}

impl Config {
    /// Loads and validates a configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file at '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.console.host.trim().is_empty() {
            anyhow::bail!("console.host must not be empty");
        }
        if self.console.username.trim().is_empty() {
            anyhow::bail!("console.username must not be empty");
        }
        if self.console.pacing_interval.is_zero() {
            tracing::warn!(
                "console.pacing_interval is 0; command bursts may overrun the console parser"
            );
        }
        Ok(())
    }
}
