#![doc(issue_tracker_base_url = "https://github.com/strata-quant/strata/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core types and capability traits for the strata factor data warehouse.
//!
//! This crate holds the vocabulary shared by every other strata crate: the
//! canonical long record, the wide frame view, field requests and endpoint
//! kinds, plus the two external capabilities the pipeline is written against
//! ([`DataProvider`] and [`RelationalStore`]) and the [`Factor`] abstraction.

/// The version of the strata-traits crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Module declarations
pub mod error;
pub mod factor;
pub mod frame;
pub mod provider;
pub mod stats;
pub mod store;
pub mod types;

// Re-exports
pub use error::{Result, StrataError};
pub use factor::Factor;
pub use frame::WideFrame;
pub use provider::{DataProvider, QueryParams};
pub use store::RelationalStore;
pub use types::{
    ADJUSTABLE_FIELDS, AdjustmentMode, Date, EndpointKind, FieldRequest, KEY_COLUMNS, LongRecord,
    Symbol, canonical_field_name, sentinel_date,
};
