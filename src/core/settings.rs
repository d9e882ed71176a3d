// src/core/settings.rs

//! Loading of the optional `config.toml` that seeds default run options.

use crate::constants::{CONFIG_DIR_NAME, CONFIG_FILENAME, CONFIG_PATH_ENV};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Could not read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid value for '{key}': {value} (expected a non-negative number of seconds)")]
    InvalidDuration { key: &'static str, value: f64 },
    #[error("Failed to expand 'cwd' path '{path}': {reason}")]
    CwdExpansion { path: String, reason: String },
}

// --- Raw TOML models ---

#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
struct SettingsFile {
    defaults: DefaultsSection,
    env: BTreeMap<String, String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default, deny_unknown_fields)]
struct DefaultsSection {
    timeout: Option<f64>,
    kill_timeout: Option<f64>,
    capture_limit: Option<usize>,
    cwd: Option<String>,
}

/// Validated user configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Default per-stage timeout.
    pub timeout: Option<Duration>,
    /// Default grace period between terminate and kill.
    pub kill_timeout: Option<Duration>,
    /// Default capture limit per stream.
    pub capture_limit: Option<usize>,
    /// Default working directory, with `~` and variables already expanded.
    pub cwd: Option<PathBuf>,
    /// Environment overrides applied to every child.
    pub env: BTreeMap<String, String>,
}

impl Settings {
    /// Loads the configuration from its default location.
    ///
    /// A missing file is not an error: defaults are returned instead.
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(&config_path()?)
    }

    /// Loads the configuration from an explicit path. Missing files yield defaults.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            log::debug!("No config file at '{}', using defaults.", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        log::debug!("Loaded config file '{}'", path.display());
        Self::from_toml_str(&content)
    }

    /// Parses and validates TOML content.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let raw: SettingsFile = toml::from_str(content)?;
        let defaults = raw.defaults;

        Ok(Self {
            timeout: defaults
                .timeout
                .map(|secs| parse_seconds("timeout", secs))
                .transpose()?,
            kill_timeout: defaults
                .kill_timeout
                .map(|secs| parse_seconds("kill_timeout", secs))
                .transpose()?,
            capture_limit: defaults.capture_limit,
            cwd: defaults.cwd.as_deref().map(expand_cwd).transpose()?,
            env: raw.env,
        })
    }
}

/// Returns the config file path: `$CONDUIT_CONFIG` if set, otherwise
/// `<config dir>/conduit/config.toml`.
pub fn config_path() -> Result<PathBuf, SettingsError> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }
    let config_dir = dirs::config_dir().ok_or(SettingsError::ConfigDirNotFound)?;
    Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILENAME))
}

/// Converts a number of seconds into a `Duration`, rejecting negative, NaN and
/// infinite values.
pub fn parse_seconds(key: &'static str, secs: f64) -> Result<Duration, SettingsError> {
    Duration::try_from_secs_f64(secs).map_err(|_| SettingsError::InvalidDuration { key, value: secs })
}

fn expand_cwd(template: &str) -> Result<PathBuf, SettingsError> {
    // `shellexpand::full` handles both `~` and `$VAR` references.
    let expanded = shellexpand::full(template).map_err(|e| SettingsError::CwdExpansion {
        path: template.to_string(),
        reason: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}
