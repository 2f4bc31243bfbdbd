//! Volatility and risk factors on forward-adjusted closes.

use crate::rolling::{map_series, pct_change, rolling, rolling_beta, sample_std};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strata_traits::{
    AdjustmentMode, Date, Factor, FieldRequest, LongRecord, Result, Symbol, WideFrame,
};
use tracing::warn;

/// Trading days per year used to annualize.
pub const TRADING_DAYS: f64 = 250.0;

const CLOSE: &str = "close_qfq";

fn close_request() -> FieldRequest {
    FieldRequest::new("pro_bar", &["close"]).with_adjustment(AdjustmentMode::Forward)
}

/// Configuration for [`AnnualizedVolatility`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityConfig {
    /// Returns per window (default: 30).
    pub window: usize,
    /// Returns required before a value is produced (default: 20).
    pub min_periods: usize,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            window: 30,
            min_periods: 20,
        }
    }
}

/// Rolling standard deviation of daily returns, scaled by `sqrt(250)`.
#[derive(Debug, Clone, Default)]
pub struct AnnualizedVolatility {
    config: VolatilityConfig,
}

impl AnnualizedVolatility {
    /// Create the factor with the given configuration.
    #[must_use]
    pub const fn new(config: VolatilityConfig) -> Self {
        Self { config }
    }
}

impl Factor for AnnualizedVolatility {
    fn name(&self) -> &str {
        "annualized_volatility"
    }

    fn category(&self) -> &str {
        "volatility"
    }

    fn description(&self) -> &str {
        "30-day std of daily returns times sqrt(250)"
    }

    fn requests(&self) -> Vec<FieldRequest> {
        vec![close_request()]
    }

    fn lookback_days(&self) -> i64 {
        60
    }

    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame> {
        let VolatilityConfig { window, min_periods } = self.config;
        map_series(inputs, CLOSE, self.name(), start, end, |closes| {
            rolling(&pct_change(closes), window, min_periods, sample_std)
                .into_iter()
                .map(|s| s * TRADING_DAYS.sqrt())
                .collect()
        })
    }
}

/// Configuration for [`MaxDrawdown`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownConfig {
    /// Days over which the deepest drawdown is taken (default: 60).
    pub window: usize,
    /// Observations required (default: 30).
    pub min_periods: usize,
}

impl Default for DrawdownConfig {
    fn default() -> Self {
        Self {
            window: 60,
            min_periods: 30,
        }
    }
}

/// Deepest drawdown from the running peak within a trailing window, as a positive fraction.
///
/// The peak runs over all history read, including the lookback.
#[derive(Debug, Clone, Default)]
pub struct MaxDrawdown {
    config: DrawdownConfig,
}

impl MaxDrawdown {
    /// Create the factor with the given configuration.
    #[must_use]
    pub const fn new(config: DrawdownConfig) -> Self {
        Self { config }
    }
}

/// Drawdown of each close from the running maximum; NaN closes stay NaN.
pub fn drawdowns(closes: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    closes
        .iter()
        .map(|&c| {
            if !c.is_finite() {
                return f64::NAN;
            }
            peak = peak.max(c);
            if peak > 0.0 { c / peak - 1.0 } else { f64::NAN }
        })
        .collect()
}

impl Factor for MaxDrawdown {
    fn name(&self) -> &str {
        "max_drawdown"
    }

    fn category(&self) -> &str {
        "volatility"
    }

    fn description(&self) -> &str {
        "Deepest 60-day drawdown from the running peak"
    }

    fn requests(&self) -> Vec<FieldRequest> {
        vec![close_request()]
    }

    fn lookback_days(&self) -> i64 {
        180
    }

    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame> {
        let DrawdownConfig { window, min_periods } = self.config;
        map_series(inputs, CLOSE, self.name(), start, end, |closes| {
            rolling(&drawdowns(closes), window, min_periods, |w| {
                w.iter().copied().fold(f64::INFINITY, f64::min).abs()
            })
        })
    }
}

/// Configuration for [`Beta`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetaConfig {
    /// Index the returns are regressed on (default: CSI 300).
    pub benchmark: Symbol,
    /// Returns per window (default: 250).
    pub window: usize,
    /// Paired returns required (default: 200).
    pub min_periods: usize,
}

impl Default for BetaConfig {
    fn default() -> Self {
        Self {
            benchmark: "000300.SH".to_string(),
            window: 250,
            min_periods: 200,
        }
    }
}

/// Rolling beta of daily returns against a benchmark index.
///
/// Stock returns come from forward-adjusted closes, benchmark returns from
/// `index_daily` closes. Returns are paired by trading date.
#[derive(Debug, Clone, Default)]
pub struct Beta {
    config: BetaConfig,
}

impl Beta {
    /// Create the factor with the given configuration.
    #[must_use]
    pub const fn new(config: BetaConfig) -> Self {
        Self { config }
    }

    /// Benchmark index code.
    #[must_use]
    pub fn benchmark(&self) -> &str {
        &self.config.benchmark
    }
}

impl Factor for Beta {
    fn name(&self) -> &str {
        "beta"
    }

    fn category(&self) -> &str {
        "volatility"
    }

    fn description(&self) -> &str {
        "250-day beta of daily returns against the CSI 300"
    }

    fn requests(&self) -> Vec<FieldRequest> {
        vec![close_request(), FieldRequest::new("index_daily", &["close"])]
    }

    fn reference_symbols(&self) -> Vec<Symbol> {
        vec![self.config.benchmark.clone()]
    }

    fn lookback_days(&self) -> i64 {
        430
    }

    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame> {
        if inputs.is_empty() {
            return Ok(WideFrame::empty());
        }
        let bench = if inputs.has_field("close") {
            inputs.series("close")?.remove(self.benchmark())
        } else {
            None
        };
        let Some(bench) = bench else {
            warn!(benchmark = self.benchmark(), "no benchmark closes, beta skipped");
            return Ok(WideFrame::empty());
        };
        let bench_dates: Vec<Date> = bench.iter().map(|(d, _)| *d).collect();
        let bench_closes: Vec<f64> = bench.iter().map(|(_, c)| *c).collect();
        let bench_returns: BTreeMap<Date, f64> =
            bench_dates.into_iter().zip(pct_change(&bench_closes)).collect();

        let mut records = Vec::new();
        for (symbol, series) in inputs.series(CLOSE)? {
            if symbol == self.config.benchmark {
                continue;
            }
            let closes: Vec<f64> = series.iter().map(|(_, c)| *c).collect();
            let stock_returns = pct_change(&closes);
            let paired: Vec<f64> = series
                .iter()
                .map(|(d, _)| bench_returns.get(d).copied().unwrap_or(f64::NAN))
                .collect();
            let betas = rolling_beta(&stock_returns, &paired, self.config.window, self.config.min_periods);
            for ((date, _), beta) in series.iter().zip(betas) {
                if *date >= start && *date <= end && beta.is_finite() {
                    records.push(LongRecord::new(symbol.as_str(), *date, self.name(), Some(beta)));
                }
            }
        }
        WideFrame::from_records(&records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(day: u32) -> Date {
        Date::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn series(symbol: &str, field: &str, values: &[f64]) -> Vec<LongRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| LongRecord::new(symbol, d(i as u32 + 1), field, Some(*v)))
            .collect()
    }

    #[test]
    fn test_volatility_of_alternating_returns() {
        let factor = AnnualizedVolatility::new(VolatilityConfig {
            window: 4,
            min_periods: 4,
        });
        // returns: +10%, -10%, +10%, -10%
        let closes = [100.0, 110.0, 99.0, 108.9, 98.01];
        let inputs = WideFrame::from_records(&series("A", CLOSE, &closes)).unwrap();
        let out = factor.calculate(&inputs, d(1), d(31)).unwrap();
        assert_eq!(out.len(), 1);
        let expected = sample_std(&[0.1, -0.1, 0.1, -0.1]) * TRADING_DAYS.sqrt();
        assert_relative_eq!(out.value("A", d(5), "annualized_volatility").unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_drawdowns_from_running_peak() {
        let dd = drawdowns(&[10.0, 12.0, 9.0, 15.0, 12.0]);
        assert_relative_eq!(dd[0], 0.0);
        assert_relative_eq!(dd[2], -0.25);
        assert_relative_eq!(dd[4], -0.2);
    }

    #[test]
    fn test_max_drawdown_window() {
        let factor = MaxDrawdown::new(DrawdownConfig {
            window: 3,
            min_periods: 2,
        });
        let inputs = WideFrame::from_records(&series("A", CLOSE, &[10.0, 12.0, 9.0, 15.0, 15.0, 15.0])).unwrap();
        let out = factor.calculate(&inputs, d(1), d(31)).unwrap();
        assert_eq!(out.value("A", d(1), "max_drawdown"), None);
        assert_relative_eq!(out.value("A", d(3), "max_drawdown").unwrap(), 0.25);
        assert_relative_eq!(out.value("A", d(5), "max_drawdown").unwrap(), 0.25);
        // the 9.0 close has left the window
        assert_relative_eq!(out.value("A", d(6), "max_drawdown").unwrap(), 0.0);
    }

    #[test]
    fn test_beta_against_benchmark() {
        let factor = Beta::new(BetaConfig {
            benchmark: "IDX".to_string(),
            window: 10,
            min_periods: 3,
        });
        let index = [100.0, 101.0, 99.0, 102.0, 103.0];
        // stock returns are twice the index returns
        let mut stock = vec![50.0];
        for w in index.windows(2) {
            let last = stock[stock.len() - 1];
            stock.push(last * (1.0 + 2.0 * (w[1] / w[0] - 1.0)));
        }
        let mut records = series("IDX", "close", &index);
        records.extend(series("A", CLOSE, &stock));
        let inputs = WideFrame::from_records(&records).unwrap();

        assert_eq!(factor.reference_symbols(), vec!["IDX"]);
        let out = factor.calculate(&inputs, d(1), d(31)).unwrap();
        assert_eq!(out.value("A", d(3), "beta"), None);
        assert_relative_eq!(out.value("A", d(4), "beta").unwrap(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(out.value("A", d(5), "beta").unwrap(), 2.0, epsilon = 1e-9);
        assert_eq!(out.symbols().unwrap().len(), 1);
    }

    #[test]
    fn test_beta_without_benchmark_is_empty() {
        let inputs = WideFrame::from_records(&series("A", "close", &[1.0, 2.0])).unwrap();
        assert!(Beta::default().calculate(&inputs, d(1), d(31)).unwrap().is_empty());
    }
}
