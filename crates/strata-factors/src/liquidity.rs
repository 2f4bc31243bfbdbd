//! Liquidity factors.

use crate::rolling::{map_series, mean, rolling};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strata_traits::{Date, Factor, FieldRequest, LongRecord, Result, WideFrame};

/// Configuration for [`Turnover20D`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnoverConfig {
    /// Days averaged (default: 20).
    pub window: usize,
    /// Days required (default: 10).
    pub min_periods: usize,
}

impl Default for TurnoverConfig {
    fn default() -> Self {
        Self {
            window: 20,
            min_periods: 10,
        }
    }
}

/// Moving average of the daily turnover rate.
#[derive(Debug, Clone, Default)]
pub struct Turnover20D {
    config: TurnoverConfig,
}

impl Turnover20D {
    /// Input column (percent of float traded).
    pub const INPUT: &'static str = "turnover_rate";

    /// Create the factor with the given configuration.
    #[must_use]
    pub const fn new(config: TurnoverConfig) -> Self {
        Self { config }
    }
}

impl Factor for Turnover20D {
    fn name(&self) -> &str {
        "turnover_20d"
    }

    fn category(&self) -> &str {
        "liquidity"
    }

    fn description(&self) -> &str {
        "20-day mean of turnover_rate from daily_basic"
    }

    fn requests(&self) -> Vec<FieldRequest> {
        vec![FieldRequest::new("daily_basic", &[Self::INPUT])]
    }

    fn lookback_days(&self) -> i64 {
        40
    }

    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame> {
        let TurnoverConfig { window, min_periods } = self.config;
        map_series(inputs, Self::INPUT, self.name(), start, end, |rates| {
            rolling(rates, window, min_periods, mean)
        })
    }
}

/// Daily Amihud illiquidity: `ln(|pct_chg| / amount_cny * 1e6 + 1)`.
///
/// `amount` is reported in thousands of CNY. Days with no turnover yield no value.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmihudIlliquidity;

impl AmihudIlliquidity {
    /// Scale applied before the log so typical values are not crushed to zero.
    pub const SCALE: f64 = 1e6;
}

impl Factor for AmihudIlliquidity {
    fn name(&self) -> &str {
        "amihud_illiquidity"
    }

    fn category(&self) -> &str {
        "liquidity"
    }

    fn description(&self) -> &str {
        "ln(|pct_chg| / amount * 1e6 + 1) from daily bars"
    }

    fn requests(&self) -> Vec<FieldRequest> {
        vec![FieldRequest::new("daily", &["pct_chg", "amount"])]
    }

    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame> {
        if inputs.is_empty() {
            return Ok(WideFrame::empty());
        }
        let amounts = inputs.series("amount")?;
        let mut records = Vec::new();
        for (symbol, changes) in inputs.series("pct_chg")? {
            let Some(amount) = amounts.get(&symbol) else {
                continue;
            };
            let amount: BTreeMap<Date, f64> = amount.iter().copied().collect();
            for (date, pct) in changes {
                if date < start || date > end {
                    continue;
                }
                let Some(&amt) = amount.get(&date) else {
                    continue;
                };
                if amt > 0.0 {
                    let value = (pct.abs() / (amt * 1000.0) * Self::SCALE + 1.0).ln();
                    records.push(LongRecord::new(symbol.as_str(), date, self.name(), Some(value)));
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

    #[test]
    fn test_turnover_average() {
        let factor = Turnover20D::new(TurnoverConfig {
            window: 3,
            min_periods: 2,
        });
        let records: Vec<LongRecord> = [1.0, 2.0, 3.0, 7.0]
            .iter()
            .enumerate()
            .map(|(i, v)| LongRecord::new("A", d(i as u32 + 1), "turnover_rate", Some(*v)))
            .collect();
        let inputs = WideFrame::from_records(&records).unwrap();
        let out = factor.calculate(&inputs, d(2), d(31)).unwrap();
        assert_relative_eq!(out.value("A", d(2), "turnover_20d").unwrap(), 1.5);
        assert_relative_eq!(out.value("A", d(4), "turnover_20d").unwrap(), 4.0);
        assert_eq!(out.value("A", d(1), "turnover_20d"), None);
    }

    #[test]
    fn test_amihud() {
        let inputs = WideFrame::from_records(&[
            LongRecord::new("A", d(2), "pct_chg", Some(-2.0)),
            LongRecord::new("A", d(2), "amount", Some(1000.0)),
            LongRecord::new("B", d(2), "pct_chg", Some(1.0)),
            LongRecord::new("B", d(2), "amount", Some(0.0)),
        ])
        .unwrap();
        let out = AmihudIlliquidity.calculate(&inputs, d(1), d(31)).unwrap();
        // 2 / 1e6 CNY * 1e6 = 2
        assert_relative_eq!(out.value("A", d(2), "amihud_illiquidity").unwrap(), 3.0_f64.ln(), epsilon = 1e-12);
        assert_eq!(out.len(), 1);
    }
}
