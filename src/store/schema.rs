//! Database schema definition and versioning for preference stores.
//!
//! This module defines the SQLite schema behind a named store and
//! provides schema versioning for future migrations.

use std::{path::Path, time::Duration};

use {
    sqlx::{
        Error as SqlxError, SqlitePool,
        sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    },
    thiserror::Error,
    tracing::debug,
};

/// Error type for schema operations.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] SqlxError),
    /// Schema migration error.
    #[error("Schema migration error: {reason}")]
    MigrationError { reason: String },
}

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Database schema definition.
pub struct SchemaManager {
    pool: SqlitePool,
}

impl SchemaManager {
    /// Creates a new schema manager.
    ///
    /// # Arguments
    ///
    /// * `pool` - The SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initializes the database schema.
    ///
    /// This method creates all necessary tables and ensures the schema
    /// is at the current version.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` if schema initialization fails or the database
    /// carries a version this build cannot read.
    pub async fn initialize_schema(&self) -> Result<(), SchemaError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        match self.stored_version().await? {
            None => {
                debug!("Creating preference store schema v{CURRENT_SCHEMA_VERSION}");
                self.create_tables().await?;
            }
            Some(version) if version == CURRENT_SCHEMA_VERSION => {}
            Some(version) => {
                return Err(SchemaError::MigrationError {
                    reason: format!("Schema migration from version {version} not implemented"),
                });
            }
        }

        Ok(())
    }

    /// Creates all tables and records the schema version in one transaction.
    async fn create_tables(&self) -> Result<(), SchemaError> {
        let mut tx = self.pool.begin().await?;

        // Bumped by every edit so writers take the lock before reading
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS store_meta (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                revision INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT OR IGNORE INTO store_meta (id, revision) VALUES (0, 0)")
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS preferences (
                key TEXT NOT NULL,
                kind TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (key, kind)
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        // Another connection may have finished the same setup first
        let recorded: Option<i32> = sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&mut *tx)
            .await?;

        if recorded.is_none() {
            sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                .bind(CURRENT_SCHEMA_VERSION)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn stored_version(&self) -> Result<Option<i32>, SchemaError> {
        let version = sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(version)
    }

    /// Gets the current schema version.
    ///
    /// # Returns
    ///
    /// The current schema version, or 0 if not initialized.
    pub async fn get_current_version(&self) -> Result<i32, SchemaError> {
        Ok(self.stored_version().await?.unwrap_or(0))
    }
}

/// Creates a connection pool for the database at `path`, creating the file if missing.
///
/// # Arguments
///
/// * `path` - Location of the SQLite database.
/// * `max_connections` - Upper bound on pooled connections.
/// * `busy_timeout` - How long a connection waits for a lock held elsewhere.
///
/// # Errors
///
/// Returns `SchemaError` if connection pool creation fails.
pub async fn create_connection_pool(
    path: &Path,
    max_connections: u32,
    busy_timeout: Duration,
) -> Result<SqlitePool, SchemaError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    Ok(pool)
}
