//! Domain-specific error types using `thiserror`.
//!
//! This module defines the error returned by preference store operations,
//! aggregating the configuration and backend errors it can surface.

use std::result::Result as StdResult;

use {anyhow::Error, thiserror::Error, tokio::task::JoinError};

use crate::{config::ConfigError, store::backend::BackendError};

/// Preference store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The value or default is not one of the supported primitive kinds.
    #[error("Unsupported type: {type_name} cannot be stored in a preference store")]
    UnsupportedType { type_name: String },
    /// Backend error while committing a write.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    /// Configuration error while opening a store.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    /// The background write task did not complete.
    #[error("Write task failed: {0}")]
    TaskJoin(#[from] JoinError),
    /// A blocking read was attempted on a single-threaded runtime.
    #[error("Blocking read attempted on a current-thread runtime")]
    BlockingInAsyncContext,
    /// The debounced writer has stopped accepting values.
    #[error("Debounced writer is closed")]
    WriterClosed,
}

/// Operational error context propagation with `anyhow`.
///
/// This type is used for operational errors that need rich context
/// but don't require specific handling logic.
pub type Result<T> = StdResult<T, Error>;

#[cfg(test)]
mod tests {
    use crate::{config::ConfigError, error::domain::StoreError};

    #[test]
    fn test_store_error_display() {
        let unsupported = StoreError::UnsupportedType {
            type_name: "object".to_string(),
        };
        assert_eq!(
            unsupported.to_string(),
            "Unsupported type: object cannot be stored in a preference store"
        );

        assert_eq!(
            StoreError::BlockingInAsyncContext.to_string(),
            "Blocking read attempted on a current-thread runtime"
        );
        assert_eq!(StoreError::WriterClosed.to_string(), "Debounced writer is closed");
    }

    #[test]
    fn test_config_error_converts() {
        let error: StoreError = ConfigError::InvalidValue {
            reason: "empty name".to_string(),
        }
        .into();
        assert_eq!(
            error.to_string(),
            "Config error: Invalid config value: empty name"
        );
    }
}
