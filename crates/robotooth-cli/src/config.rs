//! Configuration file management.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Scan timeout used when neither the command line nor the config sets one.
pub const DEFAULT_SCAN_TIMEOUT: u64 = 10;

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Default device identifier or alias
    #[serde(default)]
    pub device: Option<String>,

    /// Default scan timeout in seconds
    #[serde(default)]
    pub scan_timeout: Option<u64>,

    /// Acknowledge every write by default
    #[serde(default)]
    pub with_response: bool,

    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,

    /// Device aliases (friendly name -> device identifier)
    #[serde(default)]
    pub aliases: HashMap<String, String>,

    /// Last device a connection was completed with (auto-updated)
    #[serde(default)]
    pub last_device: Option<String>,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("robotooth")
            .join("config.toml")
    }

    /// Load config from file, or return default if not found
    pub fn load() -> Self {
        match Self::load_from(&Self::path()) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}", e);
                Self::default()
            }
        }
    }

    /// Load config from `path`. A missing file yields the default config.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Scan timeout: explicit value, then config, then [`DEFAULT_SCAN_TIMEOUT`].
    pub fn resolve_scan_timeout(&self, explicit: Option<u64>) -> u64 {
        explicit
            .or(self.scan_timeout)
            .unwrap_or(DEFAULT_SCAN_TIMEOUT)
    }

    /// Alias pointing at `device`, if any.
    pub fn alias_for(&self, device: &str) -> Option<&str> {
        let wanted = normalize(device);
        let mut names: Vec<&String> = self
            .aliases
            .iter()
            .filter(|(_, id)| normalize(id) == wanted)
            .map(|(name, _)| name)
            .collect();
        names.sort();
        names.first().map(|name| name.as_str())
    }
}

fn normalize(id: &str) -> String {
    id.replace(':', "").to_lowercase()
}

/// Resolve device from arg or config.
///
/// The argument is tried first, then the configured default device, then
/// the last device connected to. Whichever is picked goes through alias
/// resolution.
pub fn resolve_device(device: Option<String>, config: &Config) -> Option<String> {
    device
        .or_else(|| config.device.clone())
        .or_else(|| config.last_device.clone())
        .map(|d| resolve_alias(&d, config))
}

/// Resolve an alias to its device identifier, or return the original if not an alias.
pub fn resolve_alias(device: &str, config: &Config) -> String {
    config
        .aliases
        .get(device)
        .cloned()
        .unwrap_or_else(|| device.to_string())
}

/// Check if a string looks like a device address (MAC or UUID).
pub fn looks_like_address(s: &str) -> bool {
    let mac_pattern = s.chars().filter(|c| *c == ':' || *c == '-').count() >= 5
        && s.chars().all(|c| c.is_ascii_hexdigit() || c == ':' || c == '-');

    let uuid_pattern = s.len() >= 32 && s.chars().all(|c| c.is_ascii_hexdigit() || c == '-');

    mac_pattern || uuid_pattern
}

/// Record the last connected device in the config file.
pub fn update_last_device(identifier: &str) -> Result<()> {
    let mut config = Config::load();
    if config.last_device.as_deref() == Some(identifier) {
        return Ok(());
    }
    config.last_device = Some(identifier.to_string());
    config.save()
}
