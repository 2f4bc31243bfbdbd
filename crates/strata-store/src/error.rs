//! Error types for the DuckDB store.

use strata_traits::StrataError;
use thiserror::Error;

/// Errors raised by [`DuckDbStore`](crate::DuckDbStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// DuckDB rejected a statement.
    #[error("DuckDB error: {0}")]
    Duckdb(#[from] duckdb::Error),

    /// Converting between DuckDB values and a frame failed.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// The connection mutex was poisoned by a panicking writer.
    #[error("Connection lock poisoned")]
    Lock,

    /// Upsert called without key columns.
    #[error("Upsert into '{0}' needs at least one key column")]
    EmptyKey(String),

    /// A key column is absent from the rows being written.
    #[error("Key column '{column}' missing from rows for '{table}'")]
    MissingKey {
        /// Target table.
        table: String,
        /// Missing column.
        column: String,
    },
}

impl From<StoreError> for StrataError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.to_string())
    }
}
