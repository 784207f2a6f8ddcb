//! Operational error context propagation with `anyhow`.
//!
//! This module provides an extension trait for adding context to errors
//! and the reporter used wherever the store swallows a failure.

use std::{error::Error as StdError, fmt::Display};

use {
    anyhow::{Context, Error, Result as AnyhowResult},
    tracing::{error, warn},
};

/// Extension trait for enhanced error context.
pub trait ResultExt<T, E> {
    /// Adds context to an error with a static string.
    fn add_context(self, context: &'static str) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static;

    /// Adds context to an error with a formatted string.
    fn add_contextf(self, format: impl Display) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    fn add_context(self, context: &'static str) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static,
    {
        self.context(context)
    }

    fn add_contextf(self, format: impl Display) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static,
    {
        self.context(format.to_string())
    }
}

/// Centralized reporting for failures that do not reach the caller.
///
/// Reads degrade to defaults and debounced commits run detached, so their
/// errors only ever surface here.
pub struct ErrorReporter;

impl ErrorReporter {
    /// Reports a read that fell back to an empty snapshot.
    pub fn read_fallback<E>(store: &str, error: E)
    where
        E: StdError + Send + Sync + 'static,
    {
        let error = Error::new(error);
        warn!(
            store = store,
            error = %Self::to_user_message(&error),
            "Read failed, serving defaults"
        );
    }

    /// Reports a write that failed without a caller waiting on it.
    pub fn detached_write<E>(store: &str, entries: usize, error: &E)
    where
        E: StdError + ?Sized,
    {
        error!(
            store = store,
            entries = entries,
            error = %error,
            "Detached write failed"
        );
    }

    /// Converts an error to a one-line message including its causes.
    pub fn to_user_message(error: &Error) -> String {
        error
            .chain()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(": ")
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Error as IoError, ErrorKind::PermissionDenied};

    use anyhow::anyhow;

    use crate::{
        config::ConfigError,
        error::operational::{ErrorReporter, ResultExt},
    };

    #[test]
    fn test_result_ext_with_context() {
        let result: Result<(), IoError> = Err(IoError::new(PermissionDenied, "read-only"));
        let error = result.add_context("Failed to open store").unwrap_err();

        assert_eq!(error.to_string(), "Failed to open store");
        assert_eq!(error.root_cause().to_string(), "read-only");
    }

    #[test]
    fn test_result_ext_with_contextf() {
        let result: Result<(), ConfigError> = Err(ConfigError::InvalidValue {
            reason: "empty name".to_string(),
        });
        let error = result.add_contextf(format_args!("Loading {}", "store.json")).unwrap_err();

        assert_eq!(
            ErrorReporter::to_user_message(&error),
            "Loading store.json: Invalid config value: empty name"
        );
    }

    #[test]
    fn test_error_reporter_user_message() {
        let error = anyhow!("disk full").context("Failed to save preference");
        assert_eq!(
            ErrorReporter::to_user_message(&error),
            "Failed to save preference: disk full"
        );
    }

    #[test]
    fn test_reporting_does_not_panic_without_subscriber() {
        ErrorReporter::read_fallback("prefs", IoError::new(PermissionDenied, "locked"));
        ErrorReporter::detached_write("prefs", 3, &IoError::new(PermissionDenied, "locked"));
    }
}
