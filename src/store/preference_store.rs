//! Typed facade over a preference backend.
//!
//! `PreferenceStore` dispatches on the kind of the value (for writes) or of
//! the caller's default (for reads). Writes run on the store's I/O runtime
//! and the caller awaits the commit. Reads never fail on backend errors;
//! they fall back to the caller's default.

use std::sync::Arc;

use {
    serde_json::Value,
    tokio::{
        runtime::{Handle, RuntimeFlavor},
        sync::watch::Receiver,
        task::block_in_place,
    },
    tracing::debug,
};

use crate::{
    config::StoreConfig,
    error::{ErrorReporter, StoreError},
    store::{
        backend::Backend,
        snapshot::Snapshot,
        sqlite::SqliteBackend,
        value::{PreferenceValue, PrimitiveValue},
    },
};

/// Durable, type-dispatched key-value store.
///
/// Clones share the same backend. Stores opened on the same name share the
/// same durable data and see each other's committed writes.
pub struct PreferenceStore<B: Backend = SqliteBackend> {
    /// Backend holding the key-space.
    backend: Arc<B>,
    /// Runtime that runs commits.
    io: Handle,
}

impl<B: Backend> Clone for PreferenceStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            io: self.io.clone(),
        }
    }
}

impl PreferenceStore<SqliteBackend> {
    /// Opens the SQLite-backed store described by `config`.
    ///
    /// Commits will run on the runtime this is called from.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the config is invalid or the database cannot be opened.
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let backend = SqliteBackend::open(config).await?;
        Ok(Self::with_backend(backend, Handle::current()))
    }

    /// Opens the store named `default_preferences_name` in the default data directory.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the database cannot be opened.
    pub async fn open_default() -> Result<Self, StoreError> {
        Self::open(&StoreConfig::default()).await
    }
}

impl<B: Backend> PreferenceStore<B> {
    /// Wraps an existing backend.
    ///
    /// # Arguments
    ///
    /// * `backend` - Backend holding the key-space.
    /// * `io` - Runtime used to run commits.
    pub fn with_backend(backend: B, io: Handle) -> Self {
        Self {
            backend: Arc::new(backend),
            io,
        }
    }

    /// Name of the underlying key-space.
    pub fn name(&self) -> &str {
        self.backend.name()
    }

    /// Gets the backend for advanced operations.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Runtime that runs this store's commits.
    pub fn io_handle(&self) -> &Handle {
        &self.io
    }

    /// Saves `value` under `key` in the slot of its kind.
    ///
    /// Returns once the value is committed; any later read on the same name
    /// observes it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the commit fails.
    pub async fn save<V: Into<PrimitiveValue>>(&self, key: &str, value: V) -> Result<(), StoreError> {
        let value = value.into();
        debug!(store = %self.name(), key, value = %value, "Saving preference");

        let key = key.to_string();
        self.commit(move |snapshot| {
            snapshot.set(key, value);
        })
        .await
    }

    /// Saves a runtime-typed JSON value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnsupportedType` before any I/O if the value is
    /// not one of the supported kinds, or `StoreError` if the commit fails.
    pub async fn save_json(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let value = PrimitiveValue::try_from(value)?;
        self.save(key, value).await
    }

    /// Saves several entries in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the commit fails; nothing is written then.
    pub async fn save_all<I>(&self, entries: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (String, PrimitiveValue)>,
    {
        let entries: Vec<_> = entries.into_iter().collect();
        if entries.is_empty() {
            return Ok(());
        }

        debug!(store = %self.name(), count = entries.len(), "Saving preferences");
        self.commit(move |snapshot| {
            for (key, value) in entries {
                snapshot.set(key, value);
            }
        })
        .await
    }

    /// Reads `key` from the slot selected by the type of `default`.
    ///
    /// # Returns
    ///
    /// The stored value, or `default` if the slot is empty or the backend
    /// could not be read.
    pub async fn retrieve<T: PreferenceValue>(&self, key: &str, default: T) -> T {
        let snapshot = self.snapshot().await;
        match snapshot.get(key, T::KIND) {
            Some(value) => {
                debug!(store = %self.name(), key, value = %value, "Retrieved preference");
                T::from_value(value).unwrap_or(default)
            }
            None => {
                debug!(store = %self.name(), key, kind = %T::KIND, "Preference absent, using default");
                default
            }
        }
    }

    /// Reads `key` from the slot selected by the kind of `default`.
    pub async fn retrieve_value(&self, key: &str, default: PrimitiveValue) -> PrimitiveValue {
        let snapshot = self.snapshot().await;
        match snapshot.get(key, default.kind()) {
            Some(value) => {
                debug!(store = %self.name(), key, value = %value, "Retrieved preference");
                value.clone()
            }
            None => {
                debug!(store = %self.name(), key, kind = %default.kind(), "Preference absent, using default");
                default
            }
        }
    }

    /// Reads `key` with a runtime-typed JSON default.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnsupportedType` if `default` is not one of the
    /// supported kinds.
    ///
    /// A stored `NaN` or infinite float has no JSON form; `default` is
    /// returned in its place.
    pub async fn retrieve_json(&self, key: &str, default: Value) -> Result<Value, StoreError> {
        let slot = PrimitiveValue::try_from(default.clone())?;
        let value = self.retrieve_value(key, slot).await;
        Ok(value.into_json().unwrap_or_else(|| {
            debug!(store = %self.name(), key, "Stored float has no JSON form, using default");
            default
        }))
    }

    /// Blocking variant of `retrieve` for synchronous callers.
    ///
    /// Outside a runtime this blocks on the store's I/O runtime. On a
    /// multi-threaded runtime the worker is handed off with `block_in_place`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::BlockingInAsyncContext` when called from a
    /// current-thread runtime, which would otherwise deadlock. This includes
    /// `spawn_blocking` closures on such a runtime, since tokio does not let
    /// them be told apart from its driver thread; call `retrieve` through
    /// `Handle::block_on` there instead.
    pub fn retrieve_blocking<T: PreferenceValue>(&self, key: &str, default: T) -> Result<T, StoreError> {
        let read = self.retrieve(key, default);
        match Handle::try_current() {
            Ok(current) => match current.runtime_flavor() {
                RuntimeFlavor::CurrentThread => Err(StoreError::BlockingInAsyncContext),
                _ => Ok(block_in_place(|| self.io.block_on(read))),
            },
            Err(_) => Ok(self.io.block_on(read)),
        }
    }

    /// Removes every entry of the store.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the commit fails.
    pub async fn clear_data(&self) -> Result<(), StoreError> {
        debug!(store = %self.name(), "Clearing preferences");
        self.commit(Snapshot::clear).await
    }

    /// Reads the full current snapshot, empty if the backend could not be read.
    pub async fn snapshot(&self) -> Snapshot {
        match self.backend.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                ErrorReporter::read_fallback(self.name(), e);
                Snapshot::new()
            }
        }
    }

    /// Subscribes to snapshots committed or observed through this store's backend.
    pub fn subscribe(&self) -> Receiver<Arc<Snapshot>> {
        self.backend.subscribe()
    }

    /// Runs `transform` as one commit on the I/O runtime and waits for it.
    async fn commit<F>(&self, transform: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Snapshot) + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        self.io
            .spawn(async move { backend.edit(transform).await })
            .await??;
        Ok(())
    }
}
