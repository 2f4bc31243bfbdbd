//! Valuation factors from daily_basic multiples.

use crate::map_field;
use strata_traits::{Date, Factor, FieldRequest, Result, WideFrame};

/// Book-to-price: the reciprocal of the daily price-to-book ratio.
///
/// Non-positive or missing `pb` yields no value for that row.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookToPrice;

impl BookToPrice {
    /// Input column.
    pub const INPUT: &'static str = "pb";
}

impl Factor for BookToPrice {
    fn name(&self) -> &str {
        "book_to_price"
    }

    fn category(&self) -> &str {
        "value"
    }

    fn description(&self) -> &str {
        "1 / pb from daily_basic"
    }

    fn requests(&self) -> Vec<FieldRequest> {
        vec![FieldRequest::new("daily_basic", &[Self::INPUT])]
    }

    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame> {
        map_field(inputs, Self::INPUT, self.name(), start, end, |pb| {
            (pb > 0.0).then(|| 1.0 / pb)
        })
    }
}

/// Earnings yield: the reciprocal of trailing PE.
///
/// Tushare leaves `pe_ttm` empty for loss makers, so those rows have no value.
#[derive(Debug, Clone, Copy, Default)]
pub struct EarningsToPrice;

impl EarningsToPrice {
    /// Input column.
    pub const INPUT: &'static str = "pe_ttm";
}

impl Factor for EarningsToPrice {
    fn name(&self) -> &str {
        "earnings_to_price"
    }

    fn category(&self) -> &str {
        "value"
    }

    fn description(&self) -> &str {
        "1 / pe_ttm from daily_basic"
    }

    fn requests(&self) -> Vec<FieldRequest> {
        vec![FieldRequest::new("daily_basic", &[Self::INPUT])]
    }

    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame> {
        map_field(inputs, Self::INPUT, self.name(), start, end, |pe| {
            (pe > 0.0).then(|| 1.0 / pe)
        })
    }
}

/// Sales yield: the reciprocal of trailing PS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SalesToPrice;

impl SalesToPrice {
    /// Input column.
    pub const INPUT: &'static str = "ps_ttm";
}

impl Factor for SalesToPrice {
    fn name(&self) -> &str {
        "sales_to_price"
    }

    fn category(&self) -> &str {
        "value"
    }

    fn description(&self) -> &str {
        "1 / ps_ttm from daily_basic"
    }

    fn requests(&self) -> Vec<FieldRequest> {
        vec![FieldRequest::new("daily_basic", &[Self::INPUT])]
    }

    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame> {
        map_field(inputs, Self::INPUT, self.name(), start, end, |ps| {
            (ps > 0.0).then(|| 1.0 / ps)
        })
    }
}

/// Trailing dividend yield in percent, as reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct DividendYield;

impl DividendYield {
    /// Input column.
    pub const INPUT: &'static str = "dv_ttm";
}

impl Factor for DividendYield {
    fn name(&self) -> &str {
        "dividend_yield"
    }

    fn category(&self) -> &str {
        "value"
    }

    fn description(&self) -> &str {
        "dv_ttm from daily_basic"
    }

    fn requests(&self) -> Vec<FieldRequest> {
        vec![FieldRequest::new("daily_basic", &[Self::INPUT])]
    }

    fn calculate(&self, inputs: &WideFrame, start: Date, end: Date) -> Result<WideFrame> {
        map_field(inputs, Self::INPUT, self.name(), start, end, Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strata_traits::LongRecord;

    #[test]
    fn test_book_to_price() {
        let d = Date::from_ymd_opt(2024, 1, 2).unwrap();
        let inputs = WideFrame::from_records(&[
            LongRecord::new("A", d, "pb", Some(2.0)),
            LongRecord::new("B", d, "pb", Some(-1.0)),
            LongRecord::new("C", d, "pb", None),
        ])
        .unwrap();
        let out = BookToPrice.calculate(&inputs, d, d).unwrap();
        assert_relative_eq!(out.value("A", d, "book_to_price").unwrap(), 0.5);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_yields_skip_non_positive_multiples() {
        let d = Date::from_ymd_opt(2024, 1, 2).unwrap();
        let inputs = WideFrame::from_records(&[
            LongRecord::new("A", d, "pe_ttm", Some(20.0)),
            LongRecord::new("A", d, "ps_ttm", Some(4.0)),
            LongRecord::new("A", d, "dv_ttm", Some(1.5)),
            LongRecord::new("B", d, "pe_ttm", None),
            LongRecord::new("B", d, "ps_ttm", Some(0.0)),
            LongRecord::new("B", d, "dv_ttm", Some(0.0)),
        ])
        .unwrap();
        let ep = EarningsToPrice.calculate(&inputs, d, d).unwrap();
        assert_relative_eq!(ep.value("A", d, "earnings_to_price").unwrap(), 0.05);
        assert_eq!(ep.len(), 1);
        let sp = SalesToPrice.calculate(&inputs, d, d).unwrap();
        assert_relative_eq!(sp.value("A", d, "sales_to_price").unwrap(), 0.25);
        assert_eq!(sp.value("B", d, "sales_to_price"), None);
        let dy = DividendYield.calculate(&inputs, d, d).unwrap();
        assert_relative_eq!(dy.value("B", d, "dividend_yield").unwrap(), 0.0);
        assert_eq!(dy.len(), 2);
    }

    #[test]
    fn test_missing_input_column() {
        let d = Date::from_ymd_opt(2024, 1, 2).unwrap();
        let inputs = WideFrame::from_records(&[LongRecord::new("A", d, "pe", Some(2.0))]).unwrap();
        assert!(BookToPrice.calculate(&inputs, d, d).is_err());
    }
}
