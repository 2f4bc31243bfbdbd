//! Size factors.

use crate::map_field;
use strata_traits::{Date, Factor, FieldRequest, Result, WideFrame};

/// Natural log of total market value.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMarketCap;

impl LogMarketCap {
    /// Input column (total market value, 10k CNY).
    pub const INPUT: &'static str = "total_mv";
}

impl Factor for LogMarketCap {
    fn name(&self) -> &str {
        "log_market_cap"
    }

    fn category(&self) -> &str {
        "size"
    }

    fn description(&self) -> &str {
        "ln(total_mv) from daily_basic"
    }

    fn requests(&self) -> Vec<FieldRequest> {
        vec![FieldRequest::new("daily_basic", &[Self::INPUT])]
    }

    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame> {
        map_field(inputs, Self::INPUT, self.name(), start, end, |mv| {
            (mv > 0.0).then(|| mv.ln())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strata_traits::LongRecord;

    #[test]
    fn test_log_market_cap() {
        let d1 = Date::from_ymd_opt(2024, 1, 2).unwrap();
        let d2 = Date::from_ymd_opt(2024, 1, 3).unwrap();
        let inputs = WideFrame::from_records(&[
            LongRecord::new("A", d1, "total_mv", Some(std::f64::consts::E)),
            LongRecord::new("A", d2, "total_mv", Some(1.0)),
            LongRecord::new("B", d1, "total_mv", Some(0.0)),
        ])
        .unwrap();
        let out = LogMarketCap.calculate(&inputs, d1, d1).unwrap();
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out.value("A", d1, "log_market_cap").unwrap(), 1.0);
    }
}
