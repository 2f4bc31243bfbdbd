//! Growth factors: period-over-period change of income-statement items.

use strata_traits::{Date, Factor, FieldRequest, LongRecord, Result, WideFrame};

/// Change from the previous reported period, `(cur - prev) / |prev|`.
///
/// The first period and periods following a zero have no value.
pub fn period_change(series: &[(Date, f64)]) -> Vec<(Date, f64)> {
    series
        .windows(2)
        .filter_map(|pair| {
            let ((_, prev), (date, cur)) = (pair[0], pair[1]);
            (prev != 0.0).then(|| (date, (cur - prev) / prev.abs()))
        })
        .collect()
}

fn growth_of(inputs: &WideFrame, input: &str, name: &str, start: Date, end: Date) -> Result<WideFrame> {
    if inputs.is_empty() {
        return Ok(WideFrame::empty());
    }
    let mut records = Vec::new();
    for (symbol, series) in inputs.series(input)? {
        for (date, rate) in period_change(&series) {
            if date >= start && date <= end && rate.is_finite() {
                records.push(LongRecord::new(symbol.as_str(), date, name, Some(rate)));
            }
        }
    }
    WideFrame::from_records(&records)
}

/// Net profit growth on `n_income`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetProfitGrowth;

impl Factor for NetProfitGrowth {
    fn name(&self) -> &str {
        "net_profit_growth"
    }

    fn category(&self) -> &str {
        "growth"
    }

    fn description(&self) -> &str {
        "Period change of n_income over |previous|"
    }

    fn requests(&self) -> Vec<FieldRequest> {
        vec![FieldRequest::new("income", &["n_income"])]
    }

    fn lookback_days(&self) -> i64 {
        92
    }

    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame> {
        growth_of(inputs, "n_income", self.name(), start, end)
    }
}

/// Revenue growth on `revenue`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevenueGrowth;

impl Factor for RevenueGrowth {
    fn name(&self) -> &str {
        "revenue_growth"
    }

    fn category(&self) -> &str {
        "growth"
    }

    fn description(&self) -> &str {
        "Period change of revenue over |previous|"
    }

    fn requests(&self) -> Vec<FieldRequest> {
        vec![FieldRequest::new("income", &["revenue"])]
    }

    fn lookback_days(&self) -> i64 {
        92
    }

    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame> {
        growth_of(inputs, "revenue", self.name(), start, end)
    }
}
