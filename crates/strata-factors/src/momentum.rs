//! Price momentum factors.

use serde::{Deserialize, Serialize};
use strata_traits::{
    AdjustmentMode, Date, Factor, FieldRequest, LongRecord, Result, WideFrame,
};

/// Configuration for [`Return12M`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Return12MConfig {
    /// Trading days between the two prices (default: 250).
    pub window: usize,

    /// Calendar days of history fetched before the window start (default: 430, about 14 months).
    pub history_days: i64,
}

impl Default for Return12MConfig {
    fn default() -> Self {
        Self {
            window: 250,
            history_days: 430,
        }
    }
}

/// Twelve-month return on forward-adjusted closes.
///
/// For each symbol and trading date `t`: `close_qfq[t] / close_qfq[t - window] - 1`,
/// counting `window` observations back in the symbol's own series.
///
/// # Example
///
/// ```ignore
/// use strata_factors::momentum::Return12M;
///
/// let factor = Return12M::default();
/// let values = runner.compute(&factor, &symbols, start, end).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Return12M {
    config: Return12MConfig,
}

impl Return12M {
    /// Input column.
    pub const INPUT: &'static str = "close_qfq";

    /// Create the factor with the given configuration.
    #[must_use]
    pub const fn new(config: Return12MConfig) -> Self {
        Self { config }
    }

    /// Number of trading days between the two prices.
    #[must_use]
    pub const fn window(&self) -> usize {
        self.config.window
    }
}

impl Factor for Return12M {
    fn name(&self) -> &str {
        "return_12m"
    }

    fn category(&self) -> &str {
        "momentum"
    }

    fn description(&self) -> &str {
        "250-day return of the forward-adjusted close"
    }

    fn requests(&self) -> Vec<FieldRequest> {
        vec![FieldRequest::new("pro_bar", &["close"]).with_adjustment(AdjustmentMode::Forward)]
    }

    fn lookback_days(&self) -> i64 {
        self.config.history_days
    }

    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame> {
        if inputs.is_empty() {
            return Ok(WideFrame::empty());
        }
        let window = self.config.window.max(1);
        let mut records = Vec::new();

        for (symbol, series) in inputs.series(Self::INPUT)? {
            for (i, (date, price)) in series.iter().enumerate().skip(window) {
                if *date < start || *date > end {
                    continue;
                }
                let base = series[i - window].1;
                if base != 0.0 {
                    records.push(LongRecord::new(symbol.as_str(), *date, self.name(), Some(price / base - 1.0)));
                }
            }
        }
        WideFrame::from_records(&records)
    }
}
