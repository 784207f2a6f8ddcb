//! Durable backend on SQLite using sqlx.
//!
//! Each named store is one database file. Every edit runs in a single
//! transaction that takes the write lock before reading, so concurrent
//! writers from any connection or process see each other's commits.

use std::{fs::create_dir_all, sync::Arc, time::Duration};

use {
    sqlx::{Executor, Sqlite, SqlitePool},
    tokio::sync::{
        Mutex,
        watch::{Receiver, Sender, channel},
    },
    tracing::{debug, warn},
};

use crate::{
    config::StoreConfig,
    store::{
        backend::{Backend, BackendError},
        schema::{SchemaManager, create_connection_pool},
        snapshot::Snapshot,
        value::{DecodeError, PrimitiveValue, ValueKind},
    },
};

/// A stored row that could not be decoded.
#[derive(Debug)]
struct CorruptRow {
    key: String,
    kind: String,
    source: DecodeError,
}

/// Backend storing a named key-space in an SQLite database.
pub struct SqliteBackend {
    /// Store name.
    name: String,
    /// Connection pool for the store database.
    pool: SqlitePool,
    /// Serializes edits issued through this instance.
    write_gate: Mutex<()>,
    /// Latest snapshot seen by this instance.
    updates: Sender<Arc<Snapshot>>,
}

impl SqliteBackend {
    /// Opens (creating if needed) the database for `config.name`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the directory, pool or schema cannot be set up.
    pub async fn open(config: &StoreConfig) -> Result<Self, BackendError> {
        create_dir_all(&config.data_dir)?;

        let path = config.database_path();
        debug!("Opening preference store '{}' at {:?}", config.name, path);

        let pool = create_connection_pool(
            &path,
            config.max_connections,
            Duration::from_millis(config.busy_timeout_ms),
        )
        .await?;
        SchemaManager::new(pool.clone()).initialize_schema().await?;

        let initial = match read_snapshot(&pool).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(store = %config.name, error = %e, "Starting from an empty snapshot");
                Snapshot::new()
            }
        };
        let (updates, _) = channel(Arc::new(initial));

        Ok(Self {
            name: config.name.clone(),
            pool,
            write_gate: Mutex::new(()),
            updates,
        })
    }

    /// Number of edits committed to this database so far.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the query fails.
    pub async fn revision(&self) -> Result<i64, BackendError> {
        let revision = sqlx::query_scalar("SELECT revision FROM store_meta WHERE id = 0")
            .fetch_one(&self.pool)
            .await?;
        Ok(revision)
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Gets the database connection pool for advanced operations.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn publish(&self, snapshot: &Snapshot) {
        self.updates.send_if_modified(|current| {
            if current.as_ref() == snapshot {
                false
            } else {
                *current = Arc::new(snapshot.clone());
                true
            }
        });
    }
}

impl Backend for SqliteBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> Result<Snapshot, BackendError> {
        let snapshot = read_snapshot(&self.pool).await?;
        self.publish(&snapshot);
        Ok(snapshot)
    }

    async fn edit<F>(&self, transform: F) -> Result<Snapshot, BackendError>
    where
        F: FnOnce(&mut Snapshot) + Send + 'static,
    {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE store_meta SET revision = revision + 1 WHERE id = 0")
            .execute(&mut *tx)
            .await?;

        let (previous, corrupt) = read_rows(&mut *tx).await?;
        let mut next = previous.clone();
        transform(&mut next);

        // Undecodable rows are dropped on the next commit
        for row in &corrupt {
            warn!(store = %self.name, key = %row.key, error = %row.source, "Dropping corrupted entry");
            sqlx::query("DELETE FROM preferences WHERE key = ? AND kind = ?")
                .bind(&row.key)
                .bind(&row.kind)
                .execute(&mut *tx)
                .await?;
        }

        let (changed, removed) = next.diff(&previous);
        for (kind, key) in removed {
            sqlx::query("DELETE FROM preferences WHERE key = ? AND kind = ?")
                .bind(key)
                .bind(kind.as_str())
                .execute(&mut *tx)
                .await?;
        }
        for (key, value) in changed {
            sqlx::query(
                r#"
                INSERT INTO preferences (key, kind, value) VALUES (?, ?, ?)
                ON CONFLICT (key, kind) DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(key)
            .bind(value.kind().as_str())
            .bind(value.encode())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.updates.send_replace(Arc::new(next.clone()));
        Ok(next)
    }

    fn subscribe(&self) -> Receiver<Arc<Snapshot>> {
        self.updates.subscribe()
    }
}

/// Reads every row, failing on the first one that cannot be decoded.
async fn read_snapshot<'e, E>(executor: E) -> Result<Snapshot, BackendError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (snapshot, corrupt) = read_rows(executor).await?;
    match corrupt.into_iter().next() {
        None => Ok(snapshot),
        Some(row) => Err(BackendError::Corrupted {
            key: row.key,
            source: row.source,
        }),
    }
}

/// Reads every row, splitting decodable entries from corrupted ones.
async fn read_rows<'e, E>(executor: E) -> Result<(Snapshot, Vec<CorruptRow>), BackendError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<(String, String, String)> =
        sqlx::query_as("SELECT key, kind, value FROM preferences")
            .fetch_all(executor)
            .await?;

    let mut snapshot = Snapshot::new();
    let mut corrupt = Vec::new();
    for (key, kind, text) in rows {
        match kind
            .parse::<ValueKind>()
            .and_then(|parsed| PrimitiveValue::decode(parsed, &text))
        {
            Ok(value) => {
                snapshot.set(key, value);
            }
            Err(source) => corrupt.push(CorruptRow { key, kind, source }),
        }
    }

    Ok((snapshot, corrupt))
}
