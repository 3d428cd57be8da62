//! Config command implementation.
//!
//! Manages the default device and friendly device names (aliases).

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::cli::ConfigAction;
use crate::config::{Config, looks_like_address};

pub fn cmd_config(action: ConfigAction, quiet: bool) -> Result<()> {
    let output = apply(action, &Config::path())?;
    if !quiet || output.always {
        print!("{}", output.text);
    }
    Ok(())
}

#[derive(Debug)]
struct Output {
    text: String,
    /// Printed even in quiet mode, since it is the command's result.
    always: bool,
}

impl Output {
    fn result(text: String) -> Self {
        Self { text, always: true }
    }

    fn status(text: String) -> Self {
        Self {
            text,
            always: false,
        }
    }
}

fn apply(action: ConfigAction, path: &Path) -> Result<Output> {
    match action {
        ConfigAction::Path => Ok(Output::result(format!("{}\n", path.display()))),
        ConfigAction::Show => {
            if !path.exists() {
                return Ok(Output::status(format!(
                    "No config file at {}. Using defaults.\n",
                    path.display()
                )));
            }
            let config = Config::load_from(path)?;
            let text = toml::to_string_pretty(&config).context("Failed to serialize config")?;
            Ok(Output::result(text))
        }
        ConfigAction::SetDevice { device } => {
            let device = device.trim().to_string();
            if device.is_empty() {
                bail!("Device identifier cannot be empty");
            }
            let mut config = Config::load_from(path)?;
            config.device = Some(device.clone());
            config.save_to(path)?;
            Ok(Output::status(format!("Default device set to {}\n", device)))
        }
        ConfigAction::UnsetDevice => {
            let mut config = Config::load_from(path)?;
            if config.device.take().is_none() {
                return Ok(Output::status("No default device set\n".to_string()));
            }
            config.save_to(path)?;
            Ok(Output::status("Default device cleared\n".to_string()))
        }
        ConfigAction::Alias { name, device } => {
            if looks_like_address(&name) {
                bail!(
                    "Alias name '{}' looks like a device address. \
                     Use a friendly name instead (e.g., 'rover', 'arm').",
                    name
                );
            }
            let mut config = Config::load_from(path)?;
            let was_update = config.aliases.insert(name.clone(), device.clone()).is_some();
            config.save_to(path)?;
            let verb = if was_update { "Updated" } else { "Added" };
            Ok(Output::status(format!(
                "{} alias '{}' -> {}\n",
                verb, name, device
            )))
        }
        ConfigAction::Unalias { name } => {
            let mut config = Config::load_from(path)?;
            if config.aliases.remove(&name).is_none() {
                bail!("Alias '{}' not found", name);
            }
            config.save_to(path)?;
            Ok(Output::status(format!("Removed alias '{}'\n", name)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
        dir.path().join("robotooth").join("config.toml")
    }

    #[test]
    fn test_path_prints_location() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path(&dir);
        let output = apply(ConfigAction::Path, &path).unwrap();
        assert!(output.always);
        assert!(output.text.contains("config.toml"));
    }

    #[test]
    fn test_show_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = apply(ConfigAction::Show, &config_path(&dir)).unwrap();
        assert!(output.text.contains("No config file"));
    }

    #[test]
    fn test_set_device_then_show() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path(&dir);

        apply(
            ConfigAction::SetDevice {
                device: "AA:BB:CC:DD:EE:FF".to_string(),
            },
            &path,
        )
        .unwrap();
        assert_eq!(
            Config::load_from(&path).unwrap().device.as_deref(),
            Some("AA:BB:CC:DD:EE:FF")
        );

        let output = apply(ConfigAction::Show, &path).unwrap();
        assert!(output.text.contains("AA:BB:CC:DD:EE:FF"));

        let output = apply(ConfigAction::UnsetDevice, &path).unwrap();
        assert!(output.text.contains("cleared"));
        assert!(Config::load_from(&path).unwrap().device.is_none());
    }

    #[test]
    fn test_set_device_rejects_blank() {
        let dir = tempfile::tempdir().unwrap();
        let action = ConfigAction::SetDevice {
            device: "  ".to_string(),
        };
        assert!(apply(action, &config_path(&dir)).is_err());
    }

    #[test]
    fn test_alias_add_update_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path(&dir);
        let alias = |device: &str| ConfigAction::Alias {
            name: "rover".to_string(),
            device: device.to_string(),
        };

        let output = apply(alias("AA:BB:CC:DD:EE:FF"), &path).unwrap();
        assert!(output.text.starts_with("Added"));
        let output = apply(alias("11:22:33:44:55:66"), &path).unwrap();
        assert!(output.text.starts_with("Updated"));
        assert_eq!(
            Config::load_from(&path).unwrap().aliases.get("rover").map(String::as_str),
            Some("11:22:33:44:55:66")
        );

        apply(
            ConfigAction::Unalias {
                name: "rover".to_string(),
            },
            &path,
        )
        .unwrap();
        assert!(Config::load_from(&path).unwrap().aliases.is_empty());
    }

    #[test]
    fn test_alias_rejects_address_name() {
        let dir = tempfile::tempdir().unwrap();
        let action = ConfigAction::Alias {
            name: "AA:BB:CC:DD:EE:FF".to_string(),
            device: "11:22:33:44:55:66".to_string(),
        };
        let err = apply(action, &config_path(&dir)).unwrap_err();
        assert!(err.to_string().contains("looks like a device address"));
    }

    #[test]
    fn test_unalias_missing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let action = ConfigAction::Unalias {
            name: "ghost".to_string(),
        };
        assert!(apply(action, &config_path(&dir)).is_err());
    }
}
