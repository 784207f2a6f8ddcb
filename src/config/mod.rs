//! Store configuration and data directory resolution.
//!
//! This module provides store configuration with XDG Base Directory
//! compliance and JSON persistence.

pub mod settings;

pub use settings::{ConfigError, DEFAULT_PREFERENCES_NAME, StoreConfig, get_data_dir};
