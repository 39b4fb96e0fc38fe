//! Client configuration
//!
//! Every field has a default, so a TOML file only needs the values it changes:
//!
//! ```toml
//! host = "203.0.113.10"
//! port = 2306
//! password = "changeme"
//! reconnect_delay = 30      # seconds, fractions allowed
//! heartbeat_interval = 25
//! ```

use crate::error::RconError;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub auto_reconnect: bool,
    pub max_reconnect_attempts: u32,
    #[serde(deserialize_with = "seconds")]
    pub reconnect_delay: Duration,
    #[serde(deserialize_with = "seconds")]
    pub heartbeat_interval: Duration,
    /// How long a keep-alive or login may go unanswered.
    #[serde(deserialize_with = "seconds")]
    pub ack_timeout: Duration,
    #[serde(deserialize_with = "seconds")]
    pub tick_interval: Duration,
    pub kick_all_message: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2306,
            password: String::new(),
            auto_reconnect: true,
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(25),
            ack_timeout: Duration::from_secs(5),
            tick_interval: Duration::from_secs(1),
            kick_all_message: "Server is restarting".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RconError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, RconError> {
        Ok(toml::from_str(text)?)
    }

    /// `host:port` as accepted by address resolution.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(serde::de::Error::custom(format!(
            "expected a non-negative number of seconds, got {}",
            secs
        )));
    }
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}
