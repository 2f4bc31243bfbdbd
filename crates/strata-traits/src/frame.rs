//! Wide frame view over canonical long records, plus column helpers.
//!
//! A [`WideFrame`] is the pivot of long records: one row per
//! `(trade_date, ts_code)`, one `f64` column per field. Missing cells stay
//! null, they are never filled with zero.

use crate::{Date, LongRecord, Result, StrataError, Symbol};
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Symbol column of a wide frame.
pub const SYMBOL_COLUMN: &str = "ts_code";

/// Date column of a wide frame.
pub const DATE_COLUMN: &str = "trade_date";

/// Days between 0001-01-01 and the Unix epoch.
const CE_TO_UNIX_EPOCH_DAYS: i32 = 719_163;

/// Convert a polars date (days since epoch) into a [`Date`].
pub fn date_from_days(days: i32) -> Option<Date> {
    Date::from_num_days_from_ce_opt(days + CE_TO_UNIX_EPOCH_DAYS)
}

/// Parse `YYYYMMDD` or ISO `YYYY-MM-DD` (an optional time part is ignored).
pub fn parse_date(s: &str) -> Option<Date> {
    let s = s.trim();
    let head = s.get(..10).unwrap_or(s);
    Date::parse_from_str(s, "%Y%m%d")
        .or_else(|_| Date::parse_from_str(head, "%Y-%m-%d"))
        .ok()
}

/// Format a date the way the tushare API expects it.
pub fn format_compact(date: Date) -> String {
    date.format("%Y%m%d").to_string()
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(Column::as_materialized_series)
        .map_err(|_| StrataError::MissingColumn(name.to_string()))
}

/// Read a date-like column (date, `YYYYMMDD` string or integer).
pub fn column_dates(df: &DataFrame, name: &str) -> Result<Vec<Option<Date>>> {
    let series = column(df, name)?;
    match series.dtype() {
        DataType::Null => Ok(vec![None; series.len()]),
        DataType::Date => Ok(series
            .date()?
            .into_iter()
            .map(|d: Option<i32>| d.and_then(date_from_days))
            .collect()),
        DataType::String => Ok(series
            .str()?
            .into_iter()
            .map(|s: Option<&str>| s.and_then(parse_date))
            .collect()),
        dtype if dtype.is_integer() => {
            let ints = series.cast(&DataType::Int64)?;
            Ok(ints
                .i64()?
                .into_iter()
                .map(|v: Option<i64>| v.and_then(|v| parse_date(&v.to_string())))
                .collect())
        }
        other => Err(StrataError::InvalidDate(format!(
            "column '{name}' has non-date type {other}"
        ))),
    }
}

/// Read a column as `f64`; unparsable strings, NaN and infinities become `None`.
pub fn column_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = column(df, name)?.cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|v: Option<f64>| v.filter(|x| x.is_finite()))
        .collect())
}

/// Read a column as owned strings.
pub fn column_strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = column(df, name)?.cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|s: Option<&str>| s.map(str::to_string))
        .collect())
}

/// Pivoted view of long records, indexed by `(trade_date, ts_code)`.
///
/// # Example
///
/// ```
/// use strata_traits::{Date, LongRecord, WideFrame};
///
/// let d = Date::from_ymd_opt(2024, 1, 2).unwrap();
/// let frame = WideFrame::from_records(&[
///     LongRecord::new("600000.SH", d, "close", Some(10.0)),
///     LongRecord::new("000001.SZ", d, "close", Some(9.5)),
/// ])
/// .unwrap();
///
/// assert_eq!(frame.len(), 2);
/// assert_eq!(frame.value("600000.SH", d, "close"), Some(10.0));
/// ```
#[derive(Debug, Clone)]
pub struct WideFrame {
    data: DataFrame,
}

impl Default for WideFrame {
    fn default() -> Self {
        Self::empty()
    }
}

impl WideFrame {
    /// A frame with only the index columns and no rows.
    pub fn empty() -> Self {
        let data = DataFrame::new(vec![
            Column::new(SYMBOL_COLUMN.into(), Vec::<String>::new()),
            Column::new(DATE_COLUMN.into(), Vec::<Date>::new()),
        ])
        .unwrap_or_default();
        Self { data }
    }

    /// Wrap an existing frame that already carries the index columns.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::MissingColumn`] if `ts_code` or `trade_date`
    /// is absent.
    pub fn from_data(data: DataFrame) -> Result<Self> {
        for required in [SYMBOL_COLUMN, DATE_COLUMN] {
            if data.column(required).is_err() {
                return Err(StrataError::MissingColumn(required.to_string()));
            }
        }
        Ok(Self { data })
    }

    /// Pivot long records into a wide frame.
    ///
    /// Rows are ordered by date then symbol, field columns alphabetically.
    /// When the same `(symbol, date, field)` appears twice the first value
    /// is kept.
    pub fn from_records(records: &[LongRecord]) -> Result<Self> {
        let mut fields: BTreeSet<&str> = BTreeSet::new();
        let mut rows: BTreeMap<(Date, &str), BTreeMap<&str, Option<f64>>> = BTreeMap::new();

        for record in records {
            fields.insert(record.field.as_str());
            rows.entry((record.date, record.symbol.as_str()))
                .or_default()
                .entry(record.field.as_str())
                .or_insert(record.value);
        }

        let symbols: Vec<&str> = rows.keys().map(|(_, s)| *s).collect();
        let dates: Vec<Date> = rows.keys().map(|(d, _)| *d).collect();

        let mut columns = Vec::with_capacity(fields.len() + 2);
        columns.push(Column::new(SYMBOL_COLUMN.into(), symbols));
        columns.push(Column::new(DATE_COLUMN.into(), dates));
        for field in &fields {
            let values: Vec<Option<f64>> = rows
                .values()
                .map(|cells| cells.get(field).copied().flatten())
                .collect();
            columns.push(Column::new((*field).into(), values));
        }

        Ok(Self {
            data: DataFrame::new(columns)?,
        })
    }

    /// Melt back into long records, skipping null cells.
    pub fn to_records(&self) -> Result<Vec<LongRecord>> {
        let symbols = column_strings(&self.data, SYMBOL_COLUMN)?;
        let dates = column_dates(&self.data, DATE_COLUMN)?;
        let mut out = Vec::new();

        for field in self.fields() {
            let values = column_values(&self.data, &field)?;
            for ((symbol, date), value) in symbols.iter().zip(&dates).zip(values) {
                if let (Some(symbol), Some(date), Some(value)) = (symbol, date, value) {
                    out.push(LongRecord::new(symbol.clone(), *date, field.clone(), Some(value)));
                }
            }
        }
        Ok(out)
    }

    /// Union of two frames; cells present in `self` win over `other`.
    pub fn merge(&self, other: &Self) -> Result<Self> {
        if other.is_empty() {
            return Ok(self.clone());
        }
        if self.is_empty() {
            return Ok(other.clone());
        }
        let mut records = self.to_records()?;
        records.extend(other.to_records()?);
        Self::from_records(&records)
    }

    /// Distinct symbols present in the frame.
    pub fn symbols(&self) -> Result<BTreeSet<Symbol>> {
        Ok(column_strings(&self.data, SYMBOL_COLUMN)?
            .into_iter()
            .flatten()
            .collect())
    }

    /// Field columns, in frame order.
    pub fn fields(&self) -> Vec<String> {
        self.data
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != SYMBOL_COLUMN && name.as_str() != DATE_COLUMN)
            .map(|name| name.to_string())
            .collect()
    }

    /// Returns true if the frame has a column for `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.fields().iter().any(|f| f == field)
    }

    /// Per-symbol `(date, value)` series for one field, sorted by date, nulls skipped.
    pub fn series(&self, field: &str) -> Result<BTreeMap<Symbol, Vec<(Date, f64)>>> {
        let symbols = column_strings(&self.data, SYMBOL_COLUMN)?;
        let dates = column_dates(&self.data, DATE_COLUMN)?;
        let values = column_values(&self.data, field)?;

        let mut out: BTreeMap<Symbol, Vec<(Date, f64)>> = BTreeMap::new();
        for ((symbol, date), value) in symbols.into_iter().zip(dates).zip(values) {
            if let (Some(symbol), Some(date), Some(value)) = (symbol, date, value) {
                out.entry(symbol).or_default().push((date, value));
            }
        }
        for series in out.values_mut() {
            series.sort_by_key(|(d, _)| *d);
        }
        Ok(out)
    }

    /// Look up one cell.
    pub fn value(&self, symbol: &str, date: Date, field: &str) -> Option<f64> {
        let symbols = column_strings(&self.data, SYMBOL_COLUMN).ok()?;
        let dates = column_dates(&self.data, DATE_COLUMN).ok()?;
        let values = column_values(&self.data, field).ok()?;
        symbols
            .iter()
            .zip(&dates)
            .zip(values)
            .find(|((s, d), _)| s.as_deref() == Some(symbol) && *d == &Some(date))
            .and_then(|(_, v)| v)
    }

    /// Number of `(date, symbol)` rows.
    pub fn len(&self) -> usize {
        self.data.height()
    }

    /// Returns true if the frame has no rows.
    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }

    /// Borrow the underlying DataFrame.
    pub const fn data(&self) -> &DataFrame {
        &self.data
    }

    /// Consume the frame and return the underlying DataFrame.
    pub fn into_inner(self) -> DataFrame {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("20240102"), Some(d(2024, 1, 2)));
        assert_eq!(parse_date("2024-01-02"), Some(d(2024, 1, 2)));
        assert_eq!(parse_date("2024-01-02 00:00:00"), Some(d(2024, 1, 2)));
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(format_compact(d(2024, 1, 2)), "20240102");
    }

    #[test]
    fn test_pivot_missing_cells_are_null() {
        let frame = WideFrame::from_records(&[
            LongRecord::new("A", d(2024, 1, 2), "close", Some(1.0)),
            LongRecord::new("B", d(2024, 1, 2), "vol", Some(100.0)),
        ])
        .unwrap();

        assert_eq!(frame.len(), 2);
        assert_eq!(frame.fields(), vec!["close", "vol"]);
        assert_eq!(frame.value("A", d(2024, 1, 2), "vol"), None);
        assert_eq!(frame.value("B", d(2024, 1, 2), "vol"), Some(100.0));
    }

    #[test]
    fn test_first_value_wins() {
        let frame = WideFrame::from_records(&[
            LongRecord::new("A", d(2024, 1, 2), "close", Some(1.0)),
            LongRecord::new("A", d(2024, 1, 2), "close", Some(2.0)),
        ])
        .unwrap();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.value("A", d(2024, 1, 2), "close"), Some(1.0));
    }

    #[test]
    fn test_records_roundtrip() {
        let records = vec![
            LongRecord::new("A", d(2024, 1, 2), "close", Some(10.0)),
            LongRecord::new("A", d(2024, 1, 3), "close", Some(10.5)),
            LongRecord::new("B", d(2024, 1, 2), "close", Some(7.25)),
        ];
        let frame = WideFrame::from_records(&records).unwrap();
        let mut back = frame.to_records().unwrap();
        back.sort_by(|a, b| (a.date, &a.symbol).cmp(&(b.date, &b.symbol)));

        assert_eq!(back.len(), 3);
        assert_eq!(back[0], records[0]);
        assert_eq!(back[1], records[2]);
        assert_eq!(back[2], records[1]);
    }

    #[test]
    fn test_merge_prefers_self() {
        let left =
            WideFrame::from_records(&[LongRecord::new("A", d(2024, 1, 2), "close", Some(1.0))])
                .unwrap();
        let right = WideFrame::from_records(&[
            LongRecord::new("A", d(2024, 1, 2), "close", Some(9.0)),
            LongRecord::new("C", d(2024, 1, 2), "close", Some(3.0)),
        ])
        .unwrap();

        let merged = left.merge(&right).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.value("A", d(2024, 1, 2), "close"), Some(1.0));
        assert_eq!(merged.value("C", d(2024, 1, 2), "close"), Some(3.0));
        assert_eq!(merged.symbols().unwrap().len(), 2);
    }

    #[test]
    fn test_series_sorted_by_date() {
        let frame = WideFrame::from_records(&[
            LongRecord::new("A", d(2024, 1, 3), "close", Some(2.0)),
            LongRecord::new("A", d(2024, 1, 2), "close", Some(1.0)),
            LongRecord::new("A", d(2024, 1, 4), "close", None),
        ])
        .unwrap();
        let series = frame.series("close").unwrap();
        assert_eq!(series["A"], vec![(d(2024, 1, 2), 1.0), (d(2024, 1, 3), 2.0)]);
    }

    #[test]
    fn test_empty_frame() {
        let frame = WideFrame::empty();
        assert!(frame.is_empty());
        assert!(frame.fields().is_empty());
        assert!(frame.to_records().unwrap().is_empty());
    }

    #[test]
    fn test_column_helpers_parse_strings() {
        let df = df! {
            "trade_date" => ["20240102", "20240103"],
            "close" => ["10.5", "n/a"],
        }
        .unwrap();
        assert_eq!(
            column_dates(&df, "trade_date").unwrap(),
            vec![Some(d(2024, 1, 2)), Some(d(2024, 1, 3))]
        );
        assert_eq!(column_values(&df, "close").unwrap(), vec![Some(10.5), None]);
        assert!(matches!(
            column_values(&df, "open"),
            Err(StrataError::MissingColumn(_))
        ));
    }
}
