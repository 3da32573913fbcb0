// src/config/loader.rs

//! # Configuration Loader
//!
//! Reads a TOML file (or string) and deserializes it into `Config`.

use crate::config::model::{Config, ConfigError};
use crate::tee_log;
use log::Level;
use std::{fs, path::Path};

/// Load and parse the configuration from `path`.
/// Logs at DEBUG before reading and INFO on success.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    tee_log!(Level::Debug, "config", "Reading config from {:?}", path);
    let txt = fs::read_to_string(path)?;
    let cfg = from_toml(&txt)?;
    tee_log!(Level::Info, "config", "Loaded config from {:?}", path);
    Ok(cfg)
}

/// Parse configuration text. Every table and key is optional.
pub fn from_toml(txt: &str) -> Result<Config, ConfigError> {
    let cfg: Config = toml::from_str(txt)?;
    // Surface bad durations at load time rather than at first use.
    cfg.device.settings()?;
    Ok(cfg)
}
