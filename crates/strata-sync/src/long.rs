//! Conversions between long records and long-table frames.

use polars::prelude::*;
use strata_traits::{
    Date, LongRecord, Result,
    frame::{column_dates, column_strings, column_values},
};

/// Column names of a long table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongLayout {
    /// Column holding the field name.
    pub name_column: &'static str,
    /// Column holding the value.
    pub value_column: &'static str,
}

impl LongLayout {
    /// `extra_data` layout.
    pub const DATA: Self = Self {
        name_column: "data_name",
        value_column: "data_value",
    };

    /// `factor_panel_data` layout.
    pub const FACTOR: Self = Self {
        name_column: "factor_name",
        value_column: "factor_value",
    };

    /// Uniqueness key for this layout.
    pub const fn key(&self) -> [&'static str; 3] {
        ["ts_code", "trade_date", self.name_column]
    }
}

/// Build a long-table frame from records.
pub fn records_to_frame(records: &[LongRecord], layout: LongLayout) -> Result<DataFrame> {
    let symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
    let dates: Vec<Date> = records.iter().map(|r| r.date).collect();
    let names: Vec<&str> = records.iter().map(|r| r.field.as_str()).collect();
    let values: Vec<Option<f64>> = records.iter().map(|r| r.value).collect();

    Ok(DataFrame::new(vec![
        Column::new("ts_code".into(), symbols),
        Column::new("trade_date".into(), dates),
        Column::new(layout.name_column.into(), names),
        Column::new(layout.value_column.into(), values),
    ])?)
}

/// Read records back from a long-table frame; rows missing a key are skipped.
pub fn frame_to_records(frame: &DataFrame, layout: LongLayout) -> Result<Vec<LongRecord>> {
    if frame.height() == 0 {
        return Ok(Vec::new());
    }
    let symbols = column_strings(frame, "ts_code")?;
    let dates = column_dates(frame, "trade_date")?;
    let names = column_strings(frame, layout.name_column)?;
    let values = column_values(frame, layout.value_column)?;

    Ok(symbols
        .into_iter()
        .zip(dates)
        .zip(names)
        .zip(values)
        .filter_map(|(((symbol, date), name), value)| {
            Some(LongRecord::new(symbol?, date?, name?, value))
        })
        .collect())
}
