//! Store configuration with XDG Base Directory compliance.
//!
//! This module provides the `StoreConfig` that decides where a named
//! preference store lives on disk and how its backend is tuned.

use std::{
    env::var,
    fs::{create_dir_all, read_to_string, write},
    io::Error as StdError,
    path::{Path, PathBuf},
};

use {
    serde::{Deserialize, Serialize},
    serde_json::{Error as SerdeJsonError, from_str, to_string_pretty},
    thiserror::Error,
    tracing::debug,
};

/// Name of the store used when none is given.
pub const DEFAULT_PREFERENCES_NAME: &str = "default_preferences_name";

/// File extension of the SQLite database backing a named store.
const DATABASE_EXTENSION: &str = "db";

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read or write the configuration file.
    #[error("IO error: {0}")]
    IoError(#[from] StdError),
    /// Failed to serialize or deserialize the configuration.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] SerdeJsonError),
    /// Invalid configuration value.
    #[error("Invalid config value: {reason}")]
    InvalidValue { reason: String },
}

/// Serializable store configuration with default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Name of the backing store. Stores opened with the same name share data.
    pub name: String,
    /// Directory holding the store databases.
    pub data_dir: PathBuf,
    /// Maximum number of pooled database connections.
    pub max_connections: u32,
    /// How long a writer waits for the database lock, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Quiet window used by the debounced writer, in milliseconds.
    pub debounce_delay_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_PREFERENCES_NAME.to_string(),
            data_dir: get_data_dir(),
            max_connections: 4,
            busy_timeout_ms: 5000,
            debounce_delay_ms: 300,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration for the named store in the default data directory.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the backing store.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Replaces the data directory (mostly for testing).
    ///
    /// # Arguments
    ///
    /// * `data_dir` - Directory that will hold the store database.
    #[must_use]
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Loads a configuration from a JSON file.
    ///
    /// Missing fields fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading store config from file: {:?}", path);
        let contents = read_to_string(path)?;
        let config: Self = from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration to a JSON file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }

        debug!("Saving store config to file: {:?}", path);
        write(path, to_string_pretty(self)?)?;
        Ok(())
    }

    /// Checks that the configuration can address a store.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an empty name, a name containing
    /// path separators, or a zero-sized connection pool.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                reason: "store name must not be empty".to_string(),
            });
        }

        if self.name.contains(['/', '\\']) || self.name == ".." {
            return Err(ConfigError::InvalidValue {
                reason: format!("store name '{}' must not contain path separators", self.name),
            });
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                reason: "max_connections must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Path of the SQLite database backing this store.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        let mut path = self.data_dir.clone();
        path.push(format!("{}.{DATABASE_EXTENSION}", self.name));
        path
    }
}

/// Gets the default directory for store databases.
///
/// # Returns
///
/// `$XDG_DATA_HOME/prefstore`, or `$HOME/.local/share/prefstore`.
#[must_use]
pub fn get_data_dir() -> PathBuf {
    let mut data_dir = get_xdg_data_home();
    data_dir.push("prefstore");
    data_dir
}

/// Gets the XDG data home directory following XDG Base Directory specification.
///
/// Uses `XDG_DATA_HOME` environment variable if set, otherwise defaults to $HOME/.local/share
fn get_xdg_data_home() -> PathBuf {
    if let Ok(data_home) = var("XDG_DATA_HOME")
        && !data_home.is_empty()
    {
        return PathBuf::from(data_home);
    }

    if let Ok(home) = var("HOME") {
        let mut path = PathBuf::from(home);
        path.push(".local");
        path.push("share");
        return path;
    }

    // Fallback to current directory if HOME is not set (shouldn't happen on Unix)
    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use std::{
        fs::write,
        io::{Error, ErrorKind::NotFound},
        path::PathBuf,
    };

    use tempfile::TempDir;

    use crate::config::settings::{ConfigError, DEFAULT_PREFERENCES_NAME, StoreConfig};

    #[test]
    fn test_store_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.name, DEFAULT_PREFERENCES_NAME);
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.debounce_delay_ms, 300);
        assert!(config.data_dir.ends_with("prefstore"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_path() {
        let config = StoreConfig::named("settings").with_data_dir("/tmp/prefs");
        assert_eq!(config.database_path(), PathBuf::from("/tmp/prefs/settings.db"));
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        assert!(StoreConfig::named("").validate().is_err());
        assert!(StoreConfig::named("  ").validate().is_err());
        assert!(StoreConfig::named("a/b").validate().is_err());
        assert!(StoreConfig::named("..").validate().is_err());

        let mut config = StoreConfig::named("ok");
        config.max_connections = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("store.json");

        let mut config = StoreConfig::named("user").with_data_dir(temp_dir.path());
        config.busy_timeout_ms = 250;
        config.save(&path).unwrap();

        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_fills_missing_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("partial.json");
        write(&path, r#"{ "name": "partial" }"#).unwrap();

        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(loaded.name, "partial");
        assert_eq!(loaded.max_connections, 4);
        assert_eq!(loaded.busy_timeout_ms, 5000);
    }

    #[test]
    fn test_load_rejects_invalid_name() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("invalid.json");
        write(&path, r#"{ "name": "" }"#).unwrap();

        assert!(matches!(
            StoreConfig::load(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_config_error_display() {
        let io_error = Error::new(NotFound, "File not found");
        let config_error = ConfigError::IoError(io_error);
        assert!(config_error.to_string().contains("IO error"));

        let invalid_value_error = ConfigError::InvalidValue {
            reason: "test reason".to_string(),
        };
        assert_eq!(
            invalid_value_error.to_string(),
            "Invalid config value: test reason"
        );
    }
}
