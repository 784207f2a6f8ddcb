//! Prefstore - Typed Preference Storage
//!
//! Prints every entry of a preference store. The store name defaults to
//! `default_preferences_name`; pass another name as the first argument.
//! A JSON config file can be given with `PREFSTORE_CONFIG`.

use std::{
    env::{args, var_os},
    path::PathBuf,
};

use {
    anyhow::Result,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt},
};

use prefstore::{PreferenceStore, StoreConfig, error::ResultExt};

/// Main entry point for the prefstore inspection tool.
#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let mut config = match var_os("PREFSTORE_CONFIG") {
        Some(path) => {
            let path = PathBuf::from(path);
            StoreConfig::load(&path)
                .add_contextf(format_args!("Failed to load config {}", path.display()))?
        }
        None => StoreConfig::default(),
    };
    if let Some(name) = args().nth(1) {
        config.name = name;
    }

    let store = PreferenceStore::open(&config)
        .await
        .add_contextf(format_args!("Failed to open store '{}'", config.name))?;

    let snapshot = store.snapshot().await;
    info!(
        store = %store.name(),
        entries = snapshot.len(),
        path = ?config.database_path(),
        "Opened store"
    );

    for (key, value) in snapshot.iter() {
        println!("{key}\t{}\t{value}", value.kind());
    }

    store.backend().close().await;
    Ok(())
}
