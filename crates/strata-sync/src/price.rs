//! Wide price rows for the price table.
//!
//! Bars are fetched once per adjustment mode and merged on trade date into
//! the price table's column layout: unadjusted `open … close, volume, amount`,
//! `adj_factor`, and the `_qfq` / `_hfq` adjusted columns.

use polars::prelude::*;
use std::collections::BTreeMap;
use strata_traits::{
    AdjustmentMode, DataProvider, Date, QueryParams, Result, canonical_field_name,
    frame::{column_dates, column_strings, column_values},
    types::is_adjustable,
};
use tracing::debug;

/// Adjustable bar endpoint.
pub const BARS_ENDPOINT: &str = "pro_bar";

/// Adjustment factor endpoint.
pub const FACTOR_ENDPOINT: &str = "adj_factor";

/// Column holding the adjustment factor.
pub const FACTOR_COLUMN: &str = "adj_factor";

/// Every adjustment mode, in the order the price table lists them.
pub const ALL_MODES: [AdjustmentMode; 3] = [
    AdjustmentMode::None,
    AdjustmentMode::Forward,
    AdjustmentMode::Backward,
];

/// Price-table column a bar field lands in, if any.
pub fn price_column(field: &str, mode: AdjustmentMode) -> Option<String> {
    match (field, mode) {
        (FACTOR_COLUMN, _) => Some(FACTOR_COLUMN.to_string()),
        ("open" | "high" | "low" | "close", AdjustmentMode::None) => Some(field.to_string()),
        ("vol", AdjustmentMode::None) => Some("volume".to_string()),
        ("amount", AdjustmentMode::None) => Some("amount".to_string()),
        (_, AdjustmentMode::None) => None,
        (f, m) if is_adjustable(f) => Some(canonical_field_name(f, m)),
        _ => None,
    }
}

/// Merge one symbol's bar frames (one per mode) into price-table rows.
///
/// The first frame to provide a cell wins. Rows of other symbols are ignored.
pub fn merge_bars(symbol: &str, frames: &[(AdjustmentMode, DataFrame)]) -> Result<DataFrame> {
    let mut columns: Vec<String> = Vec::new();
    let mut rows: BTreeMap<Date, BTreeMap<String, Option<f64>>> = BTreeMap::new();

    for (mode, frame) in frames {
        if frame.height() == 0 {
            continue;
        }
        let symbols = column_strings(frame, "ts_code")?;
        let dates = column_dates(frame, "trade_date")?;
        let keep: Vec<(usize, Date)> = symbols
            .iter()
            .zip(dates)
            .enumerate()
            .filter(|(_, (s, _))| s.as_deref() == Some(symbol))
            .filter_map(|(i, (_, d))| d.map(|d| (i, d)))
            .collect();

        for name in frame.get_column_names() {
            let Some(target) = price_column(name.as_str(), *mode) else {
                continue;
            };
            if !columns.contains(&target) {
                columns.push(target.clone());
            }
            let values = column_values(frame, name.as_str())?;
            for (i, date) in &keep {
                rows.entry(*date)
                    .or_default()
                    .entry(target.clone())
                    .or_insert(values[*i]);
            }
        }
    }

    let dates: Vec<Date> = rows.keys().copied().collect();
    let mut out = vec![
        Column::new("ts_code".into(), vec![symbol; dates.len()]),
        Column::new("trade_date".into(), dates),
    ];
    for name in &columns {
        let values: Vec<Option<f64>> = rows
            .values()
            .map(|row| row.get(name).copied().flatten())
            .collect();
        out.push(Column::new(name.as_str().into(), values));
    }
    Ok(DataFrame::new(out)?)
}

/// Fetch `symbol`'s bars under each of `modes` and merge them.
///
/// # Errors
///
/// Propagates the first provider failure.
pub async fn fetch_price_rows(
    provider: &dyn DataProvider,
    symbol: &str,
    start: Date,
    end: Date,
    modes: &[AdjustmentMode],
) -> Result<DataFrame> {
    let mut frames = Vec::with_capacity(modes.len());
    for mode in modes {
        let params = QueryParams::for_symbol(symbol)
            .with_range(start, end)
            .with_adjustment(*mode);
        frames.push((*mode, provider.query(BARS_ENDPOINT, &params).await?));
    }
    let rows = merge_bars(symbol, &frames)?;
    debug!(symbol, rows = rows.height(), %start, %end, "price rows fetched");
    Ok(rows)
}
