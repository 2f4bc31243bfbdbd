//! Error types for the strata warehouse.
//!
//! Failures are meant to be isolated at the smallest meaningful unit (one
//! symbol, one endpoint, one table). The variants below are what crosses
//! those boundaries when a caller asks for a `Result`.

use thiserror::Error;

/// The main error type for strata operations.
#[derive(Debug, Error)]
pub enum StrataError {
    /// An endpoint name that the provider has no metadata for.
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// The provider failed (network, quota, malformed payload).
    #[error("Provider failure on {endpoint}: {message}")]
    Provider {
        /// Endpoint that was being queried.
        endpoint: String,
        /// Provider-supplied description.
        message: String,
    },

    /// The relational store rejected a read or write.
    #[error("Store error: {0}")]
    Store(String),

    /// A target table is absent and no DDL could be found or inferred for it.
    #[error("Cannot create table '{table}': {reason}")]
    TableCreation {
        /// Table that was missing.
        table: String,
        /// Why no DDL was available.
        reason: String,
    },

    /// Error due to invalid or malformed data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Error when a required column is missing from a frame.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Error from Polars operations.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Error when data is insufficient for the requested computation.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Error when a date is out of range or cannot be parsed.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Error when a factor is not registered.
    #[error("Factor not found: {0}")]
    FactorNotFound(String),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),
}

impl StrataError {
    /// Convenience constructor for provider failures.
    pub fn provider(endpoint: impl Into<String>, message: impl ToString) -> Self {
        Self::Provider {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }
}

impl From<String> for StrataError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for StrataError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

/// A specialized Result type for strata operations.
pub type Result<T> = std::result::Result<T, StrataError>;
