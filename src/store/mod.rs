//! Typed, durable preference storage.
//!
//! This module provides the `PreferenceStore` facade, the closed set of
//! storable value kinds, the backend contract with its SQLite and in-memory
//! implementations, and a debounced writer for bursts of saves.

pub mod backend;
pub mod debounce;
pub mod preference_store;
pub mod schema;
pub mod snapshot;
pub mod sqlite;
pub mod value;

pub use {
    backend::{Backend, BackendError, MemoryBackend},
    debounce::{DebounceConfig, DebouncedWriter},
    preference_store::PreferenceStore,
    schema::{CURRENT_SCHEMA_VERSION, SchemaManager},
    snapshot::Snapshot,
    sqlite::SqliteBackend,
    value::{DecodeError, PreferenceValue, PrimitiveValue, ValueKind},
};
