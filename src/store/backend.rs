//! Persistence backend contract and the in-memory backend.
//!
//! A backend owns one named key-space. It must provide an atomic
//! read-modify-write over the whole snapshot, a read of the latest committed
//! snapshot, and a subscription to snapshots it commits.

use std::{future::Future, io::Error as IoError, sync::Arc};

use {
    parking_lot::RwLock,
    sqlx::Error as SqlxError,
    thiserror::Error,
    tokio::sync::watch::{Receiver, Sender, channel},
};

use crate::store::{schema::SchemaError, snapshot::Snapshot, value::DecodeError};

/// Error type for backend operations.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Database connection or query error.
    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),
    /// Schema initialization error.
    #[error("Schema error: {0}")]
    SchemaError(#[from] SchemaError),
    /// Failed to prepare the store directory.
    #[error("IO error: {0}")]
    IoError(#[from] IoError),
    /// A stored entry could not be decoded.
    #[error("Corrupted entry '{key}': {source}")]
    Corrupted {
        key: String,
        #[source]
        source: DecodeError,
    },
}

/// Durable key-space addressed by name.
pub trait Backend: Send + Sync + 'static {
    /// Name of the key-space.
    fn name(&self) -> &str;

    /// Reads the latest committed snapshot.
    fn load(&self) -> impl Future<Output = Result<Snapshot, BackendError>> + Send;

    /// Applies `transform` to the current snapshot and commits the result atomically.
    ///
    /// # Returns
    ///
    /// The committed snapshot.
    fn edit<F>(&self, transform: F) -> impl Future<Output = Result<Snapshot, BackendError>> + Send
    where
        F: FnOnce(&mut Snapshot) + Send + 'static;

    /// Subscribes to snapshots committed through this backend instance.
    fn subscribe(&self) -> Receiver<Arc<Snapshot>>;
}

/// Process-local backend.
///
/// Clones share the same key-space, which is how two stores opened on the
/// same name behave. Nothing survives the process.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    name: Arc<str>,
    snapshot: Arc<RwLock<Snapshot>>,
    updates: Arc<Sender<Arc<Snapshot>>>,
}

impl MemoryBackend {
    /// Creates an empty in-memory key-space.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let (updates, _) = channel(Arc::new(Snapshot::new()));
        Self {
            name: Arc::from(name),
            snapshot: Arc::new(RwLock::new(Snapshot::new())),
            updates: Arc::new(updates),
        }
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> Result<Snapshot, BackendError> {
        Ok(self.snapshot.read().clone())
    }

    async fn edit<F>(&self, transform: F) -> Result<Snapshot, BackendError>
    where
        F: FnOnce(&mut Snapshot) + Send + 'static,
    {
        let committed = {
            let mut snapshot = self.snapshot.write();
            transform(&mut *snapshot);
            snapshot.clone()
        };

        self.updates.send_replace(Arc::new(committed.clone()));
        Ok(committed)
    }

    fn subscribe(&self) -> Receiver<Arc<Snapshot>> {
        self.updates.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use tokio::test as TokioTest;

    use crate::store::{
        backend::{Backend, BackendError, MemoryBackend},
        value::{DecodeError, PrimitiveValue, ValueKind},
    };

    #[TokioTest]
    async fn test_memory_backend_clones_share_state() {
        let first = MemoryBackend::new("shared");
        let second = first.clone();

        first
            .edit(|snapshot| {
                snapshot.set("k", PrimitiveValue::Long(9));
            })
            .await
            .unwrap();

        let loaded = second.load().await.unwrap();
        assert_eq!(loaded.get_as::<i64>("k"), Some(9));
        assert_eq!(second.name(), "shared");
    }

    #[TokioTest]
    async fn test_memory_backend_publishes_commits() {
        let backend = MemoryBackend::new("watched");
        let mut updates = backend.subscribe();

        backend
            .edit(|snapshot| {
                snapshot.set("k", PrimitiveValue::Boolean(true));
            })
            .await
            .unwrap();

        updates.changed().await.unwrap();
        assert_eq!(updates.borrow().get_as::<bool>("k"), Some(true));
    }

    #[test]
    fn test_backend_error_display() {
        let error = BackendError::Corrupted {
            key: "volume".to_string(),
            source: DecodeError::Malformed {
                kind: ValueKind::Int,
                reason: "invalid digit found in string".to_string(),
            },
        };
        assert_eq!(
            error.to_string(),
            "Corrupted entry 'volume': Malformed int value: invalid digit found in string"
        );
    }
}
