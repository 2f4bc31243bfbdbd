//! Factor evaluation for strata.
//!
//! This crate measures how well stored factor values predict returns:
//! - Pearson IC and Spearman rank IC per cross-section
//! - Summary statistics (mean, std, IC-IR, t-stat, positive ratio)
//! - An analyzer reading `factor_panel_data` and the wide price table
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_eval::IcAnalyzer;
//!
//! let analyzer = IcAnalyzer::new(store);
//! let report = analyzer.analyze("book_to_price", None, None)?;
//! println!("rank IC {:.4}, IR {:.2}", report.rank_ic.mean, report.rank_ic.ic_ir);
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod analysis;
pub mod ic;

pub use analysis::{DailyIc, IcAnalyzer, IcConfig, IcReport, IcSummary, daily_ic, forward_returns};
pub use ic::{compute_ranks, pearson_ic, spearman_ic};
