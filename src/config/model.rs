// src/config/model.rs

use serde::Deserialize;
use thiserror::Error;

use crate::interface::InterfaceId;
use crate::overlapped::TimeoutPolicy;
use crate::platform::Timeout;

/// Top-level config as deserialized from TOML
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)] pub logging: LoggingConfig,
    #[serde(default)] pub device:  DeviceConfig,
}

/// Mirror of the `[logging]` table
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]                   pub enable: bool,
    #[serde(default)]                   pub file:   Option<String>,
    #[serde(default = "default_level")] pub level:  String,
}
fn default_level() -> String { "INFO".into() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { enable: false, file: None, level: default_level() }
    }
}

/// Mirror of the `[device]` table
#[derive(Debug, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]                     pub interface:  Option<InterfaceId>,
    /// humantime duration (`"250ms"`, `"5s"`) or `"infinite"`
    #[serde(default = "default_timeout")] pub timeout:    String,
    #[serde(default)]                     pub on_timeout: TimeoutPolicy,
}
fn default_timeout() -> String { "infinite".into() }

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { interface: None, timeout: default_timeout(), on_timeout: TimeoutPolicy::default() }
    }
}

/// Fully-typed device settings used at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceSettings {
    pub interface:  Option<InterfaceId>,
    pub timeout:    Timeout,
    pub on_timeout: TimeoutPolicy,
}

impl DeviceConfig {
    /// Resolve the raw strings into runtime values.
    pub fn settings(&self) -> Result<DeviceSettings, ConfigError> {
        Ok(DeviceSettings {
            interface:  self.interface,
            timeout:    parse_timeout(&self.timeout)?,
            on_timeout: self.on_timeout,
        })
    }
}

fn parse_timeout(s: &str) -> Result<Timeout, ConfigError> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("infinite") {
        return Ok(Timeout::Infinite);
    }
    humantime::parse_duration(s)
        .map(Timeout::After)
        .map_err(|e| ConfigError::InvalidDuration(s.into(), e))
}

/// All the ways config loading can go wrong
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid duration '{0}': {1}")]
    InvalidDuration(String, #[source] humantime::DurationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
