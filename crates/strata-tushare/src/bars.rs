//! Adjusted bar composition (`pro_bar`).
//!
//! Tushare's `pro_bar` is a client-side helper: it downloads raw `daily`
//! bars and `adj_factor`, then rescales prices. Forward adjustment anchors
//! on the latest factor in the fetched window, backward adjustment on the
//! raw factor.

use crate::error::TushareError;
use polars::prelude::*;
use std::collections::HashMap;
use strata_traits::{
    AdjustmentMode, Date, Symbol,
    frame::{column_dates, column_strings, column_values},
    types::is_adjustable,
};

type Key = (Symbol, Date);

fn keyed_factors(factors: &DataFrame) -> Result<HashMap<Key, f64>, TushareError> {
    if factors.height() == 0 {
        return Ok(HashMap::new());
    }
    let symbols = column_strings(factors, "ts_code")?;
    let dates = column_dates(factors, "trade_date")?;
    let values = column_values(factors, "adj_factor")?;
    Ok(symbols
        .into_iter()
        .zip(dates)
        .zip(values)
        .filter_map(|((s, d), v)| Some(((s?, d?), v?)))
        .collect())
}

/// Latest factor per symbol.
fn latest_factors(factors: &HashMap<Key, f64>) -> HashMap<&str, f64> {
    let mut latest: HashMap<&str, (Date, f64)> = HashMap::new();
    for ((symbol, date), value) in factors {
        latest
            .entry(symbol.as_str())
            .and_modify(|slot| {
                if *date > slot.0 {
                    *slot = (*date, *value);
                }
            })
            .or_insert((*date, *value));
    }
    latest.into_iter().map(|(s, (_, v))| (s, v)).collect()
}

/// Rescale the adjustable columns of `daily` and append `adj_factor`.
///
/// Column names are left unchanged; renaming to `_qfq`/`_hfq` happens when
/// the frame is unified. Rows without a factor get null adjusted prices.
pub fn adjust_bars(
    daily: &DataFrame,
    factors: &DataFrame,
    mode: AdjustmentMode,
) -> Result<DataFrame, TushareError> {
    if daily.height() == 0 {
        return Ok(daily.clone());
    }

    let keyed = keyed_factors(factors)?;
    let latest = latest_factors(&keyed);
    let symbols = column_strings(daily, "ts_code")?;
    let dates = column_dates(daily, "trade_date")?;

    let row_factor: Vec<Option<f64>> = symbols
        .iter()
        .zip(&dates)
        .map(|(s, d)| match (s, d) {
            (Some(s), Some(d)) => keyed.get(&(s.clone(), *d)).copied(),
            _ => None,
        })
        .collect();
    let scale: Vec<Option<f64>> = symbols
        .iter()
        .zip(&row_factor)
        .map(|(s, f)| {
            let f = (*f)?;
            match mode {
                AdjustmentMode::None => Some(1.0),
                AdjustmentMode::Backward => Some(f),
                AdjustmentMode::Forward => {
                    let anchor = latest.get(s.as_deref()?)?;
                    (*anchor != 0.0).then(|| f / anchor)
                }
            }
        })
        .collect();

    let mut columns = Vec::with_capacity(daily.width() + 1);
    for col in daily.get_columns() {
        let name = col.name().as_str();
        if mode != AdjustmentMode::None && is_adjustable(name) {
            let adjusted: Vec<Option<f64>> = column_values(daily, name)?
                .into_iter()
                .zip(&scale)
                .map(|(v, k)| Some(v? * (*k)?))
                .collect();
            columns.push(Column::new(col.name().clone(), adjusted));
        } else {
            columns.push(col.clone());
        }
    }
    if daily.column("adj_factor").is_err() {
        columns.push(Column::new("adj_factor".into(), row_factor));
    }

    Ok(DataFrame::new(columns)?)
}
