//! Acquisition and reconciliation pipeline for the strata warehouse.
//!
//! The pipeline turns declarative [`FieldRequest`](strata_traits::FieldRequest)s
//! into a [`WideFrame`](strata_traits::WideFrame), reading from the long
//! table first and fetching only what it lacks:
//!
//! - [`QuerySpecNormalizer`]: classifies requests as static, periodic or time series
//! - [`OnlineFetcher`]: runs the provider calls for a normalized query
//! - [`ResponseUnifier`]: reshapes raw frames into canonical long records
//! - [`GapFillOrchestrator`]: store-first resolution with write-back
//! - [`AdjustmentReconciler`]: detects adjustment-factor revisions and rewrites history
//! - [`DailyUpdater`]: incremental price update followed by reconciliation
//! - [`WideToLongSync`]: copies a wide table into the long table
//! - [`ReferenceLoader`]: fills stock, index and industry reference tables
//!
//! # Example
//!
//! ```ignore
//! use strata_sync::GapFillOrchestrator;
//! use strata_traits::{AdjustmentMode, FieldRequest};
//!
//! let orchestrator = GapFillOrchestrator::new(provider, gateway);
//! let requests = [
//!     FieldRequest::new("daily_basic", &["pe", "pb"]),
//!     FieldRequest::new("pro_bar", &["close"]).with_adjustment(AdjustmentMode::Forward),
//! ];
//! let wide = orchestrator.resolve(&symbols, &requests, start, end).await?;
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod daily;
pub mod fetcher;
pub mod gap_fill;
pub mod loaders;
pub mod long;
pub mod normalizer;
pub mod price;
pub mod reconciler;
pub mod sync_narrow;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod unifier;

pub use daily::{DailyReport, DailyUpdater, UpdateReport};
pub use fetcher::OnlineFetcher;
pub use gap_fill::{GapFillConfig, GapFillOrchestrator};
pub use loaders::{LoadReport, ReferenceLoader};
pub use long::LongLayout;
pub use normalizer::{ClassifiedRequest, NormalizedQuery, QuerySpecNormalizer};
pub use reconciler::{AdjustmentReconciler, ReconcileConfig, SymbolSpan, SymbolState};
pub use sync_narrow::{SyncConfig, SyncReport, WideToLongSync, sync_wide_to_long};
pub use unifier::{RawResponses, ResponseUnifier};
