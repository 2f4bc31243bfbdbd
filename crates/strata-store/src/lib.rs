//! Relational storage for the strata warehouse.
//!
//! - [`DuckDbStore`]: embedded DuckDB implementation of
//!   [`RelationalStore`](strata_traits::RelationalStore).
//! - [`SchemaCatalog`]: DDL templates for the known tables.
//! - [`UpsertGateway`]: idempotent keyed writes with table bootstrap.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use strata_store::{DuckDbStore, SchemaCatalog, UpsertGateway, catalog};
//!
//! let store = Arc::new(DuckDbStore::open("strata.duckdb")?);
//! let gateway = UpsertGateway::new(store, SchemaCatalog::default());
//! let outcome = gateway.upsert(catalog::LONG_TABLE, &rows, &catalog::LONG_KEY);
//! ```

pub mod catalog;
mod error;
mod store;
pub mod upsert;

pub use catalog::SchemaCatalog;
pub use error::StoreError;
pub use store::DuckDbStore;
pub use upsert::{CreatePolicy, UpsertGateway, UpsertOutcome};
