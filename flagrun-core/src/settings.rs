//! Persisted operator settings.
//!
//! A handful of string settings survive between sessions in a small JSON
//! file. They are read once at startup and written back on save.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{FlagrunConfig, IdentityConfig, MetricsConfig};

/// Errors raised while loading or saving settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Settings I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Operator settings stored between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Identifier the flag client environment is initialized with
    pub client_side_id: String,
    /// Prefix of generated user keys
    pub user_key_prefix: String,
    /// Event key for the latency metric
    pub latency_metric_key: String,
    /// Event key for the error metric
    pub error_metric_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        let identity = IdentityConfig::default();
        let metrics = MetricsConfig::default();
        Self {
            client_side_id: "650e1ecc844ace12c3e99023".to_string(),
            user_key_prefix: identity.user_key_prefix,
            latency_metric_key: metrics.latency_event_key,
            error_metric_key: metrics.error_event_key,
        }
    }
}

impl Settings {
    /// Copies identity and metric keys into an engine configuration.
    pub fn apply_to(&self, config: &mut FlagrunConfig) {
        config.identity.user_key_prefix = self.user_key_prefix.clone();
        config.metrics.latency_event_key = self.latency_metric_key.clone();
        config.metrics.error_event_key = self.error_metric_key.clone();
    }
}

/// JSON file backed settings storage.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Creates a store for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the settings file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads settings, falling back to defaults when the file does not exist.
    ///
    /// Keys missing from the file take their default values.
    ///
    /// # Errors
    /// - `SettingsError::Io` - File exists but cannot be read
    /// - `SettingsError::Malformed` - File is not valid settings JSON
    pub fn load(&self) -> Result<Settings, SettingsError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    "No settings file at {}, using defaults",
                    self.path.display()
                );
                return Ok(Settings::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_str(&contents).map_err(|source| SettingsError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    /// Writes settings, creating parent directories as needed.
    ///
    /// # Errors
    /// - `SettingsError::Io` - Directory or file cannot be written
    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        // Serializing plain strings cannot fail
        let json = serde_json::to_string_pretty(settings).map_err(|source| {
            SettingsError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;

        std::fs::write(&self.path, json).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })?;

        tracing::info!("Settings saved to {}", self.path.display());
        Ok(())
    }

    /// Removes the settings file so defaults apply again.
    ///
    /// # Errors
    /// - `SettingsError::Io` - File exists but cannot be removed
    pub fn reset(&self) -> Result<(), SettingsError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SettingsError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
