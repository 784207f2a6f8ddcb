//! Prefstore - Typed Preference Storage
//!
//! A durable key-value store for application preferences. Values are one of
//! a closed set of primitive kinds, persisted in a named SQLite database,
//! written through atomic transactions and read back with the caller's
//! default standing in for anything absent or unreadable.

pub mod config;
pub mod error;
pub mod store;

// Re-export key types for convenience
pub use {
    config::{DEFAULT_PREFERENCES_NAME, StoreConfig},
    error::{ErrorReporter, StoreError},
    store::{
        Backend, DebounceConfig, DebouncedWriter, MemoryBackend, PreferenceStore, PreferenceValue,
        PrimitiveValue, Snapshot, SqliteBackend, ValueKind,
    },
};
