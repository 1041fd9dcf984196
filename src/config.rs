//! Controller configuration
//!
//! TOML-sourced, immutable after load. Covers the device identity, broker
//! endpoint and the session timing knobs; everything timing-related carries
//! the firmware defaults so a minimal config file only needs the device id
//! and broker host.

use crate::session::{SessionOptions, SessionTiming, DEFAULT_HANDLER_CAPACITY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Top-level configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerConfig {
    pub device: DeviceSection,
    pub broker: BrokerSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub settings: SettingsSection,
}

/// Device identity section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Device identifier (must match [a-zA-Z0-9._-]+); used as the client id
    /// base and the outbound topic namespace.
    pub id: String,
}

/// Broker endpoint section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    pub host: String,
    #[serde(default = "default_broker_port")]
    pub port: u16,
    /// Credentials are only used when both fields are present and non-empty;
    /// a partial pair connects anonymously.
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_max_packet_bytes")]
    pub max_packet_bytes: u32,
    /// Suffix the client id with a random disambiguator per connect.
    #[serde(default = "default_unique_client_id")]
    pub unique_client_id: bool,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: default_broker_port(),
            username: None,
            password: None,
            keep_alive_secs: default_keep_alive_secs(),
            max_packet_bytes: default_max_packet_bytes(),
            unique_client_id: default_unique_client_id(),
        }
    }
}

/// Session timing section; defaults match the design values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSection {
    pub reconnect_cooldown_secs: u64,
    pub connect_timeout_ms: u64,
    pub pump_slice_ms: u64,
    pub handler_capacity: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            reconnect_cooldown_secs: 15,
            connect_timeout_ms: 3_000,
            pump_slice_ms: 20,
            handler_capacity: DEFAULT_HANDLER_CAPACITY,
        }
    }
}

/// Settings persistence section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SettingsSection {
    pub path: PathBuf,
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("settings.json"),
        }
    }
}

fn default_broker_port() -> u16 {
    1883
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_max_packet_bytes() -> u32 {
    1024
}

fn default_unique_client_id() -> bool {
    true
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("invalid device id: {0}")]
    InvalidDeviceId(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ControllerConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ControllerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_device_id(&self.device.id)?;

        if self.broker.host.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "broker host must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Session parameters derived from this configuration.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            device_id: self.device.id.clone(),
            username: self.broker.username.clone(),
            password: self.broker.password.clone(),
            unique_client_id: self.broker.unique_client_id,
            timing: SessionTiming {
                reconnect_cooldown: Duration::from_secs(self.session.reconnect_cooldown_secs),
                connect_timeout: Duration::from_millis(self.session.connect_timeout_ms),
                pump_slice: Duration::from_millis(self.session.pump_slice_ms),
            },
            handler_capacity: self.session.handler_capacity,
        }
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[device]
id = "test-controller"

[broker]
host = "localhost"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Device ids end up inside topics and client identifiers, so the character
/// set is restricted.
fn validate_device_id(device_id: &str) -> Result<(), ConfigError> {
    let valid_chars = device_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if device_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidDeviceId(format!(
            "device id '{device_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}
