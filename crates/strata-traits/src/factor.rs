//! Factor trait for cross-sectional signals.
//!
//! A factor declares which fields it needs, how much history before the
//! evaluation window it reads, and turns a wide input frame into a wide
//! frame holding a single column named after the factor.

use crate::{Date, FieldRequest, Result, Symbol, WideFrame};

/// A cross-sectional signal computed from warehouse fields.
///
/// # Example
///
/// ```no_run
/// use strata_traits::{Date, Factor, FieldRequest, Result, WideFrame};
///
/// struct Turnover;
///
/// impl Factor for Turnover {
///     fn name(&self) -> &str {
///         "turnover"
///     }
///
///     fn requests(&self) -> Vec<FieldRequest> {
///         vec![FieldRequest::new("daily_basic", &["turnover_rate"])]
///     }
///
///     fn calculate(&self, inputs: &WideFrame, _start: Date, _end: Date) -> Result<WideFrame> {
///         Ok(inputs.clone())
///     }
/// }
/// ```
pub trait Factor: Send + Sync {
    /// Unique factor name; also the output column and the stored `factor_name`.
    fn name(&self) -> &str;

    /// Grouping used by the registry (momentum, value, size...).
    fn category(&self) -> &str {
        "uncategorized"
    }

    /// One-line description.
    fn description(&self) -> &str {
        ""
    }

    /// Field requests needed to compute the factor.
    fn requests(&self) -> Vec<FieldRequest>;

    /// Extra instruments resolved alongside the universe, such as a benchmark index.
    ///
    /// They feed the calculation but get no factor value of their own.
    fn reference_symbols(&self) -> Vec<Symbol> {
        Vec::new()
    }

    /// Calendar days of history required before the window start.
    fn lookback_days(&self) -> i64 {
        0
    }

    /// Compute factor values for dates in `[start, end]`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required input column is missing.
    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame>;
}
