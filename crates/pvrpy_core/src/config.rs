//! Configuration for the bridge.
//!
//! Two sources:
//! - [`AddonConfig`]: the properties the host hands over at Create. These
//!   are forwarded to the implementation's `ADDON_Create` unchanged.
//! - [`BridgeSettings`]: the bridge's own TOML file in the user path,
//!   created with defaults on first start and written atomically.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name of the bridge settings inside the user path.
pub const SETTINGS_FILE: &str = "bridge.toml";

/// Properties supplied by the host when the add-on is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonConfig {
    /// Writable per-user directory of the add-on.
    pub user_path: String,
    /// Installation directory; holds the implementation module.
    pub client_path: String,
    /// How many days of EPG the host wants.
    pub epg_max_days: i32,
}

impl AddonConfig {
    pub fn new(user_path: impl Into<String>, client_path: impl Into<String>, epg_max_days: i32) -> Self {
        Self {
            user_path: user_path.into(),
            client_path: client_path.into(),
            epg_max_days,
        }
    }

    /// Where the bridge settings file lives.
    pub fn settings_path(&self) -> PathBuf {
        Path::new(&self.user_path).join(SETTINGS_FILE)
    }
}

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root of `bridge.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// Which module and factory provide the implementation.
    #[serde(default)]
    pub runtime: RuntimeSettings,

    /// Bridge diagnostics.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Implementation module lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Module imported from the client path.
    #[serde(default = "default_module")]
    pub module: String,

    /// Module-level callable returning the implementation instance.
    #[serde(default = "default_factory")]
    pub factory: String,
}

fn default_module() -> String {
    "pvrimpl".to_string()
}

fn default_factory() -> String {
    "getInstance".to_string()
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            module: default_module(),
            factory: default_factory(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,

    /// Also write a log file into the user path.
    #[serde(default = "default_true")]
    pub file: bool,
}

fn default_level() -> String {
    "debug".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: true,
        }
    }
}

/// Loads and saves `bridge.toml`.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: BridgeSettings,
}

impl ConfigManager {
    /// Does not load anything - call [`ConfigManager::load_or_create`] after.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: BridgeSettings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    pub fn into_settings(self) -> BridgeSettings {
        self.settings
    }

    /// Load the file, creating it with defaults when it does not exist.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            self.settings = toml::from_str(&content)?;
        } else {
            if let Some(parent) = self.config_path.parent() {
                fs::create_dir_all(parent)?;
            }
            self.settings = BridgeSettings::default();
            self.save()?;
        }
        Ok(())
    }

    /// Write the current settings atomically.
    pub fn save(&self) -> ConfigResult<()> {
        let mut content = String::from("# PVR Python bridge settings\n\n");
        content.push_str(&toml::to_string_pretty(&self.settings)?);
        self.atomic_write(&content)?;
        Ok(())
    }

    fn atomic_write(&self, content: &str) -> io::Result<()> {
        let temp_path = self.config_path.with_extension("toml.tmp");

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.config_path)
    }
}

/// Settings for `config`, creating the file with defaults when absent.
///
/// Callers fall back to [`BridgeSettings::default`] on error. The error is
/// returned rather than logged so it can be reported once tracing is up.
pub fn load_settings(config: &AddonConfig) -> ConfigResult<BridgeSettings> {
    let mut manager = ConfigManager::new(config.settings_path());
    manager.load_or_create()?;
    Ok(manager.into_settings())
}
