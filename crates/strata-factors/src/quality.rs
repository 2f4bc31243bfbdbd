//! Balance-sheet quality factors, one value per report period.

use std::collections::BTreeMap;
use strata_traits::{Date, Factor, FieldRequest, LongRecord, Result, WideFrame};

/// Return on equity: net income over average shareholders' equity.
///
/// Equity is averaged over the current and the previous reported period;
/// the first period in the window uses its own equity.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnOnEquity;

impl ReturnOnEquity {
    /// Equity column, minority interests included.
    pub const EQUITY: &'static str = "total_hldr_eqy_inc_min_int";
}

impl Factor for ReturnOnEquity {
    fn name(&self) -> &str {
        "roe"
    }

    fn category(&self) -> &str {
        "quality"
    }

    fn description(&self) -> &str {
        "n_income / average total_hldr_eqy_inc_min_int"
    }

    fn requests(&self) -> Vec<FieldRequest> {
        vec![
            FieldRequest::new("income", &["n_income"]),
            FieldRequest::new("balancesheet", &[Self::EQUITY]),
        ]
    }

    fn lookback_days(&self) -> i64 {
        183
    }

    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame> {
        if inputs.is_empty() {
            return Ok(WideFrame::empty());
        }
        let equity = inputs.series(Self::EQUITY)?;
        let mut records = Vec::new();
        for (symbol, income) in inputs.series("n_income")? {
            let Some(equity) = equity.get(&symbol) else {
                continue;
            };
            let equity: BTreeMap<Date, f64> = equity.iter().copied().collect();
            for (date, n_income) in income {
                if date < start || date > end {
                    continue;
                }
                let Some(&current) = equity.get(&date) else {
                    continue;
                };
                let average = equity
                    .range(..date)
                    .next_back()
                    .map_or(current, |(_, prev)| (current + prev) / 2.0);
                let roe = n_income / average;
                if roe.is_finite() {
                    records.push(LongRecord::new(symbol.as_str(), date, self.name(), Some(roe)));
                }
            }
        }
        WideFrame::from_records(&records)
    }
}

/// Total liabilities over total assets.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebtToAssets;

impl Factor for DebtToAssets {
    fn name(&self) -> &str {
        "debt_to_assets"
    }

    fn category(&self) -> &str {
        "quality"
    }

    fn description(&self) -> &str {
        "total_liab / total_assets from balancesheet"
    }

    fn requests(&self) -> Vec<FieldRequest> {
        vec![FieldRequest::new("balancesheet", &["total_liab", "total_assets"])]
    }

    fn lookback_days(&self) -> i64 {
        183
    }

    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame> {
        if inputs.is_empty() {
            return Ok(WideFrame::empty());
        }
        let assets = inputs.series("total_assets")?;
        let mut records = Vec::new();
        for (symbol, liabilities) in inputs.series("total_liab")? {
            let Some(assets) = assets.get(&symbol) else {
                continue;
            };
            let assets: BTreeMap<Date, f64> = assets.iter().copied().collect();
            for (date, liab) in liabilities {
                if date < start || date > end {
                    continue;
                }
                if let Some(&total) = assets.get(&date).filter(|a| **a != 0.0) {
                    records.push(LongRecord::new(symbol.as_str(), date, self.name(), Some(liab / total)));
                }
            }
        }
        WideFrame::from_records(&records)
    }
}
