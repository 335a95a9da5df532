use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alerts::TwilioConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: io::Error },
    #[error("Failed to write config file {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: io::Error },
    #[error("Failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("No config path available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub workers: Workers,
    pub storage: Storage,
    pub alerts: Alerts,
    pub logging: Logging,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Workers {
    pub check_interval_seconds: u64,
    pub rotation_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Storage {
    pub database_path: path::PathBuf,
    pub logs_dir: path::PathBuf,
    pub pool_size: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Alerts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twilio: Option<TwilioConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub format: String,
}

impl Default for Workers {
    fn default() -> Self {
        Self { check_interval_seconds: 60, rotation_interval_seconds: 24 * 60 * 60 }
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            database_path: ".data/upcheck.db".into(),
            logs_dir: ".logs".into(),
            pool_size: 8,
        }
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self { level: "info".into(), format: "compact".into() }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/upcheck/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("upcheck/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Workers")?;
        write_1(f, "Check Interval (s)", &self.workers.check_interval_seconds)?;
        write_1(f, "Rotation Interval (s)", &self.workers.rotation_interval_seconds)?;
        write_title_1(f, "Storage")?;
        write_1(f, "Database", &self.storage.database_path.display())?;
        write_1(f, "Logs Directory", &self.storage.logs_dir.display())?;
        write_1(f, "Pool Size", &self.storage.pool_size)?;
        write_title_1(f, "Alerts")?;
        match &self.alerts.twilio {
            Some(twilio) => {
                write_1(f, "Provider", &"twilio")?;
                write_1(f, "From", &twilio.from_phone)?;
                write_1(f, "API Base", &twilio.api_base)?;
            }
            None => write_1(f, "Provider", &"none (log only)")?,
        }
        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.logging.level)?;
        write_1(f, "Format", &self.logging.format)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/upcheck/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```rust,no_run
    /// use upcheck::config::Config;
    ///
    /// let cfg = Config::from_config(None::<&std::path::Path>).unwrap();
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        let write_failed =
            |source: io::Error| ConfigError::WriteFailed { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        fs::write(path, config_str).map_err(write_failed)
    }

    pub fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.workers.check_interval_seconds.max(1))
    }

    pub fn rotation_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.workers.rotation_interval_seconds.max(1))
    }
}
