//! Technical indicators on forward-adjusted closes.

use crate::rolling::{ema, map_series, mean, rolling, sample_std};
use serde::{Deserialize, Serialize};
use strata_traits::{AdjustmentMode, Date, Factor, FieldRequest, Result, WideFrame};

const CLOSE: &str = "close_qfq";

fn close_request() -> FieldRequest {
    FieldRequest::new("pro_bar", &["close"]).with_adjustment(AdjustmentMode::Forward)
}

/// MACD line: `ema(close, 12) - ema(close, 26)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Macd;

impl Macd {
    /// Fast average span.
    pub const FAST: usize = 12;
    /// Slow average span.
    pub const SLOW: usize = 26;
}

impl Factor for Macd {
    fn name(&self) -> &str {
        "macd"
    }

    fn category(&self) -> &str {
        "technical"
    }

    fn description(&self) -> &str {
        "12-day EMA minus 26-day EMA of the forward-adjusted close"
    }

    fn requests(&self) -> Vec<FieldRequest> {
        vec![close_request()]
    }

    fn lookback_days(&self) -> i64 {
        60
    }

    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame> {
        map_series(inputs, CLOSE, self.name(), start, end, |closes| {
            ema(closes, Self::FAST)
                .into_iter()
                .zip(ema(closes, Self::SLOW))
                .map(|(fast, slow)| fast - slow)
                .collect()
        })
    }
}

/// Configuration for [`BollingerWidth`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BollingerConfig {
    /// Moving-average period (default: 20).
    pub period: usize,
    /// Band half-width in standard deviations (default: 2.0).
    pub std_multiplier: f64,
}

impl Default for BollingerConfig {
    fn default() -> Self {
        Self {
            period: 20,
            std_multiplier: 2.0,
        }
    }
}

/// Bollinger band width: `(upper - lower) / middle`.
#[derive(Debug, Clone, Default)]
pub struct BollingerWidth {
    config: BollingerConfig,
}

impl BollingerWidth {
    /// Create the factor with the given configuration.
    #[must_use]
    pub const fn new(config: BollingerConfig) -> Self {
        Self { config }
    }
}

impl Factor for BollingerWidth {
    fn name(&self) -> &str {
        "bollinger_width"
    }

    fn category(&self) -> &str {
        "technical"
    }

    fn description(&self) -> &str {
        "Width of the 20-day, 2-sigma Bollinger band over its midline"
    }

    fn requests(&self) -> Vec<FieldRequest> {
        vec![close_request()]
    }

    fn lookback_days(&self) -> i64 {
        60
    }

    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame> {
        let BollingerConfig { period, std_multiplier } = self.config;
        map_series(inputs, CLOSE, self.name(), start, end, |closes| {
            rolling(closes, period, period, |w| {
                let mid = mean(w);
                if mid == 0.0 {
                    f64::NAN
                } else {
                    2.0 * std_multiplier * sample_std(w) / mid
                }
            })
        })
    }
}

/// 14-day relative strength index with exponential averaging of gains and losses.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rsi14;

impl Rsi14 {
    /// Averaging span.
    pub const SPAN: usize = 14;
}

/// RSI from exponential averages of gains and losses; NaN until two closes exist.
pub fn rsi(closes: &[f64], span: usize) -> Vec<f64> {
    let mut gains = vec![f64::NAN; closes.len()];
    let mut losses = vec![f64::NAN; closes.len()];
    for (i, pair) in closes.windows(2).enumerate() {
        let delta = pair[1] - pair[0];
        if delta.is_finite() {
            gains[i + 1] = delta.max(0.0);
            losses[i + 1] = (-delta).max(0.0);
        }
    }
    ema(&gains, span)
        .into_iter()
        .zip(ema(&losses, span))
        .map(|(gain, loss)| {
            if !gain.is_finite() || !loss.is_finite() {
                f64::NAN
            } else if loss == 0.0 {
                if gain == 0.0 { f64::NAN } else { 100.0 }
            } else {
                100.0 - 100.0 / (1.0 + gain / loss)
            }
        })
        .collect()
}

impl Factor for Rsi14 {
    fn name(&self) -> &str {
        "rsi_14"
    }

    fn category(&self) -> &str {
        "technical"
    }

    fn description(&self) -> &str {
        "14-day RSI of the forward-adjusted close"
    }

    fn requests(&self) -> Vec<FieldRequest> {
        vec![close_request()]
    }

    fn lookback_days(&self) -> i64 {
        30
    }

    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame> {
        map_series(inputs, CLOSE, self.name(), start, end, |closes| rsi(closes, Self::SPAN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strata_traits::LongRecord;

    fn d(day: u32) -> Date {
        Date::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn closes(values: &[f64]) -> WideFrame {
        let records: Vec<LongRecord> = values
            .iter()
            .enumerate()
            .map(|(i, v)| LongRecord::new("A", d(i as u32 + 1), CLOSE, Some(*v)))
            .collect();
        WideFrame::from_records(&records).unwrap()
    }

    #[test]
    fn test_macd_flat_then_rising() {
        let out = Macd.calculate(&closes(&[10.0, 10.0, 10.0, 11.0]), d(1), d(31)).unwrap();
        assert_relative_eq!(out.value("A", d(3), "macd").unwrap(), 0.0);
        let fast = 10.0 + 2.0 / 13.0;
        let slow = 10.0 + 2.0 / 27.0;
        assert_relative_eq!(out.value("A", d(4), "macd").unwrap(), fast - slow, epsilon = 1e-12);
    }

    #[test]
    fn test_bollinger_width() {
        let factor = BollingerWidth::new(BollingerConfig {
            period: 3,
            std_multiplier: 2.0,
        });
        let out = factor.calculate(&closes(&[9.0, 10.0, 11.0]), d(1), d(31)).unwrap();
        assert_eq!(out.len(), 1);
        // std 1, mid 10: (4 * 1) / 10
        assert_relative_eq!(out.value("A", d(3), "bollinger_width").unwrap(), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_rsi_bounds() {
        let up = rsi(&[1.0, 2.0, 3.0], 14);
        assert!(up[0].is_nan());
        assert_relative_eq!(up[2], 100.0);

        // span 3: gains ema [1, 0.5], losses ema [0, 1]
        let mixed = rsi(&[10.0, 11.0, 9.0], 3);
        assert_relative_eq!(mixed[1], 100.0);
        assert_relative_eq!(mixed[2], 100.0 - 100.0 / 1.5, epsilon = 1e-12);

        let out = Rsi14.calculate(&closes(&[10.0, 10.0, 10.0]), d(1), d(31)).unwrap();
        assert!(out.is_empty());
    }
}
