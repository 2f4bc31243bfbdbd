#![doc(issue_tracker_base_url = "https://github.com/strata-quant/strata/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # strata
//!
//! Factor data warehouse for A-share equity research.
//!
//! strata is an umbrella crate that re-exports the strata sub-crates. Data
//! flows from a provider into a DuckDB store in canonical long form, is
//! served back as wide frames, and feeds factor computation and evaluation.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use strata::prelude::*;
//!
//! let store: Arc<dyn RelationalStore> = Arc::new(DuckDbStore::open("strata.duckdb")?);
//! let gateway = UpsertGateway::new(store, SchemaCatalog::default());
//! let provider = Arc::new(TushareClient::from_env()?);
//!
//! let orchestrator = GapFillOrchestrator::new(provider, gateway);
//! let frame = orchestrator
//!     .resolve(&symbols, &[FieldRequest::new("daily_basic", &["pb", "total_mv"])], start, end)
//!     .await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`traits`] - Core types and capabilities ([`DataProvider`], [`RelationalStore`], [`Factor`])
//! - [`tushare`] - Tushare Pro HTTP client
//! - [`store`] - DuckDB store, schema catalog and upsert gateway
//! - [`sync`] - Gap fill, adjustment reconciliation, daily update, wide-to-long sync
//! - [`factors`] - Factor implementations, preprocessing and persistence
//! - [`eval`] - IC analysis

/// Version information for the strata crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Core Traits
// ============================================================================

/// Core types and capability traits.
pub mod traits {
    pub use strata_traits::*;
}

pub use strata_traits::{
    DataProvider, Date, Factor, FieldRequest, RelationalStore, Result, StrataError, Symbol,
    WideFrame,
};

// ============================================================================
// Data Providers
// ============================================================================

/// Tushare Pro API client.
///
/// Set `TUSHARE_TOKEN` in the environment or a `.env` file, then build the
/// client with `TushareClient::from_env()`.
pub mod tushare {
    pub use strata_tushare::*;
}

// ============================================================================
// Storage
// ============================================================================

/// DuckDB store, known table definitions and the upsert gateway.
pub mod store {
    pub use strata_store::*;
}

// ============================================================================
// Pipelines
// ============================================================================

/// Acquisition and maintenance pipelines.
///
/// - **GapFillOrchestrator**: serve fields from the store, fetching only what is missing
/// - **AdjustmentReconciler**: detect adjustment-factor drift and refresh qfq prices
/// - **DailyUpdater**: incremental price update followed by reconciliation
/// - **WideToLongSync**: melt a wide table into `extra_data`
/// - **ReferenceLoader**: load stock, index and industry reference tables
pub mod sync {
    pub use strata_sync::*;
}

// ============================================================================
// Factors
// ============================================================================

/// Factor implementations and the runner that stores them.
pub mod factors {
    pub use strata_factors::*;
}

// ============================================================================
// Evaluation
// ============================================================================

/// Factor evaluation.
///
/// ```text
/// IC_t    = corr(factor_t, return_{t -> t+1})
/// IC-IR   = mean(IC) / std(IC)
/// t-stat  = IC-IR * sqrt(periods)
/// ```
pub mod eval {
    pub use strata_eval::*;
}

// ============================================================================
// Prelude
// ============================================================================

/// Prelude module for convenient imports.
///
/// ```ignore
/// use strata::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        DataProvider, Date, Factor, FieldRequest, RelationalStore, Result, StrataError, Symbol,
        WideFrame,
    };
    pub use strata_eval::IcAnalyzer;
    pub use strata_factors::{FactorRunner, IndustryClassification, create_factor};
    pub use strata_store::{DuckDbStore, SchemaCatalog, UpsertGateway};
    pub use strata_sync::{AdjustmentReconciler, DailyUpdater, GapFillOrchestrator, ReferenceLoader};
    pub use strata_tushare::TushareClient;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
    }

    #[test]
    fn test_re_exports() {
        fn _accept_factor(_factor: &dyn Factor) {}
        fn _accept_provider(_provider: &dyn DataProvider) {}
        fn _accept_store(_store: &dyn RelationalStore) {}
    }

    #[test]
    fn test_registry_reachable() {
        assert!(factors::create_factor("return_12m").is_some());
        assert!(!store::SchemaCatalog::default().ddl_for("extra_data").unwrap_or_default().is_empty());
    }
}
