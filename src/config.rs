//! Configuration management
//!
//! Installation-wide defaults, not per-client session state (which this bridge
//! never persists). Defaults are embedded at compile time and can be overridden
//! by an optional `--config <path>` TOML file with the same shape.

use crate::constants::{DEFAULT_PREFIX, DEFAULT_SYS_ID, DISCOVERY_PORT, SERIAL_BAUD};
use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Short printable identifier string reported in `/serialosc/device` and `/sys/id`.
    pub sys_id: String,
    /// Fixed UDP port the discovery socket binds to.
    pub discovery_port: u16,
    /// Default OSC address prefix assigned to new sessions.
    pub default_prefix: String,
    /// Serial baud rate.
    pub baud_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sys_id: DEFAULT_SYS_ID.to_string(),
            discovery_port: DISCOVERY_PORT,
            default_prefix: DEFAULT_PREFIX.to_string(),
            baud_rate: SERIAL_BAUD,
        }
    }
}

impl Config {
    /// Load the embedded default configuration.
    pub fn load_default() -> Result<Self> {
        parse(DEFAULT_CONFIG_TOML)
    }

    /// Load configuration from a file, falling back to embedded defaults for
    /// any field the file omits (`#[serde(default)]` on each field).
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| BridgeError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        parse(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.default_prefix.is_empty() || !self.default_prefix.starts_with('/') {
            return Err(BridgeError::ConfigValidation {
                field: "default_prefix",
                reason: "must be non-empty and start with '/'".to_string(),
            });
        }
        if self.sys_id.is_empty() {
            return Err(BridgeError::ConfigValidation {
                field: "sys_id",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn parse(text: &str) -> Result<Config> {
    let config: Config = toml::from_str(text).map_err(|e| BridgeError::ConfigValidation {
        field: "config",
        reason: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}
