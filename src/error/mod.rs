//! Error handling using `thiserror` and `anyhow`.
//!
//! This module provides the domain error for store operations and
//! operational error context propagation for the binary and for
//! failures the store swallows.

pub mod domain;
pub mod operational;

pub use {
    domain::StoreError,
    operational::{ErrorReporter, ResultExt},
};
