//! Reshaping of raw provider frames into canonical long records.
//!
//! Every endpoint shape ends up as `(symbol, observation_date, field, value)`:
//!
//! - static frames are stamped with the sentinel date,
//! - periodic frames use their report period as the date,
//! - time-series frames are joined per symbol on the trading dates of the
//!   first non-empty endpoint, then melted.
//!
//! A field that two endpoints both provide is taken from the first one.

use crate::normalizer::ClassifiedRequest;
use polars::prelude::DataFrame;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use strata_traits::{
    Date, KEY_COLUMNS, LongRecord, Result, Symbol, canonical_field_name,
    frame::{column_dates, column_strings, column_values},
    sentinel_date,
};
use tracing::{debug, warn};

/// One endpoint's raw answer.
pub type Response = (ClassifiedRequest, DataFrame);

/// Raw provider answers grouped by fetch strategy.
#[derive(Debug, Clone, Default)]
pub struct RawResponses {
    /// Symbols the responses were fetched for; empty means no restriction.
    pub symbols: Vec<Symbol>,
    /// One frame per static endpoint, covering the whole symbol set.
    pub static_frames: Vec<Response>,
    /// Periodic frames per symbol, in request order.
    pub periodic: BTreeMap<Symbol, Vec<Response>>,
    /// Time-series frames per symbol, in request order.
    pub time_series: BTreeMap<Symbol, Vec<Response>>,
}

impl RawResponses {
    /// Total number of frames held.
    pub fn len(&self) -> usize {
        self.static_frames.len()
            + self.periodic.values().map(Vec::len).sum::<usize>()
            + self.time_series.values().map(Vec::len).sum::<usize>()
    }

    /// Returns true if no frames were collected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source column and canonical name of each value column to melt.
fn value_columns(classified: &ClassifiedRequest, frame: &DataFrame) -> Vec<(String, String)> {
    let available: Vec<String> = frame
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let is_key = |name: &str| {
        KEY_COLUMNS.contains(&name)
            || name == classified.symbol_column()
            || classified.date_column() == Some(name)
    };

    let request = &classified.request;
    let sources: Vec<String> = if request.fields.is_empty() {
        available.into_iter().filter(|c| !is_key(c)).collect()
    } else {
        let mut sources = Vec::new();
        for field in &request.fields {
            if is_key(field) || sources.contains(field) {
                continue;
            }
            if available.contains(field) {
                sources.push(field.clone());
            } else {
                warn!(
                    endpoint = %request.endpoint,
                    field = %field,
                    "DataIntegrityWarning: requested field missing from response"
                );
            }
        }
        sources
    };

    sources
        .into_iter()
        .map(|src| {
            let canonical = canonical_field_name(&src, request.adjustment);
            (src, canonical)
        })
        .collect()
}

/// Collects records, ignoring repeats of a `(symbol, date, field)` key.
#[derive(Debug, Default)]
struct RecordSink {
    seen: HashSet<(Symbol, Date, String)>,
    records: Vec<LongRecord>,
}

impl RecordSink {
    fn push(&mut self, symbol: &str, date: Date, field: &str, value: Option<f64>) {
        if self
            .seen
            .insert((symbol.to_string(), date, field.to_string()))
        {
            self.records
                .push(LongRecord::new(symbol, date, field, value));
        }
    }
}

/// Turns [`RawResponses`] into canonical long records.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseUnifier;

impl ResponseUnifier {
    /// Create a unifier.
    pub const fn new() -> Self {
        Self
    }

    /// Reshape every bucket. Endpoints that cannot be reshaped are logged and skipped.
    pub fn unify(&self, responses: &RawResponses) -> Vec<LongRecord> {
        let mut sink = RecordSink::default();
        let allowed: HashSet<&str> = responses.symbols.iter().map(String::as_str).collect();

        let mut claimed: HashSet<String> = HashSet::new();
        for (classified, frame) in &responses.static_frames {
            if let Err(err) = Self::melt_static(classified, frame, &allowed, &mut claimed, &mut sink) {
                warn!(endpoint = %classified.request.endpoint, error = %err, "static response skipped");
            }
        }

        for (symbol, frames) in &responses.periodic {
            let mut claimed: HashSet<String> = HashSet::new();
            for (classified, frame) in frames {
                if let Err(err) = Self::melt_dated(symbol, classified, frame, None, &mut claimed, &mut sink) {
                    warn!(endpoint = %classified.request.endpoint, symbol = %symbol, error = %err, "periodic response skipped");
                }
            }
        }

        for (symbol, frames) in &responses.time_series {
            let mut claimed: HashSet<String> = HashSet::new();
            let mut base: Option<BTreeSet<Date>> = None;
            for (classified, frame) in frames {
                if let Err(err) =
                    Self::melt_dated(symbol, classified, frame, Some(&mut base), &mut claimed, &mut sink)
                {
                    warn!(endpoint = %classified.request.endpoint, symbol = %symbol, error = %err, "time-series response skipped");
                }
            }
        }

        debug!(records = sink.records.len(), "responses unified");
        sink.records
    }

    fn melt_static(
        classified: &ClassifiedRequest,
        frame: &DataFrame,
        allowed: &HashSet<&str>,
        claimed: &mut HashSet<String>,
        sink: &mut RecordSink,
    ) -> Result<()> {
        if frame.height() == 0 {
            warn!(endpoint = %classified.request.endpoint, "empty static response");
            return Ok(());
        }
        let sentinel = sentinel_date();
        let symbols = column_strings(frame, classified.symbol_column())?;

        for (source, canonical) in value_columns(classified, frame) {
            if !claimed.insert(canonical.clone()) {
                continue;
            }
            let values = column_values(frame, &source)?;
            for (symbol, value) in symbols.iter().zip(values) {
                let Some(symbol) = symbol else { continue };
                if allowed.is_empty() || allowed.contains(symbol.as_str()) {
                    sink.push(symbol, sentinel, &canonical, value);
                }
            }
        }
        Ok(())
    }

    /// Melt one symbol's periodic or time-series frame.
    ///
    /// With `base`, rows are restricted to the dates of the first non-empty
    /// frame (a left join on that frame's keys).
    fn melt_dated(
        symbol: &str,
        classified: &ClassifiedRequest,
        frame: &DataFrame,
        base: Option<&mut Option<BTreeSet<Date>>>,
        claimed: &mut HashSet<String>,
        sink: &mut RecordSink,
    ) -> Result<()> {
        let endpoint = classified.request.endpoint.as_str();
        let Some(date_column) = classified.date_column() else {
            return Ok(());
        };

        let rows: Vec<(usize, Date)> = if frame.height() == 0 {
            Vec::new()
        } else {
            let symbols = column_strings(frame, classified.symbol_column())?;
            let dates = column_dates(frame, date_column)?;
            let undated = dates.iter().filter(|d| d.is_none()).count();
            if undated > 0 {
                warn!(endpoint, symbol, rows = undated, "DataIntegrityWarning: rows without a date dropped");
            }
            symbols
                .iter()
                .zip(dates)
                .enumerate()
                .filter(|(_, (s, _))| s.as_deref() == Some(symbol))
                .filter_map(|(i, (_, d))| d.map(|d| (i, d)))
                .collect()
        };
        if rows.is_empty() {
            warn!(endpoint, symbol, "empty response");
            return Ok(());
        }

        let rows: Vec<(usize, Date)> = match base {
            Some(base) => {
                let keys = base.get_or_insert_with(|| rows.iter().map(|(_, d)| *d).collect());
                rows.into_iter().filter(|(_, d)| keys.contains(d)).collect()
            }
            None => rows,
        };

        for (source, canonical) in value_columns(classified, frame) {
            if !claimed.insert(canonical.clone()) {
                debug!(endpoint, field = %canonical, "duplicate column dropped");
                continue;
            }
            let values = column_values(frame, &source)?;
            for (i, date) in &rows {
                sink.push(symbol, *date, &canonical, values[*i]);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use strata_traits::{AdjustmentMode, EndpointKind, FieldRequest, WideFrame};

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    fn classified(endpoint: &str, fields: &[&str], kind: EndpointKind) -> ClassifiedRequest {
        ClassifiedRequest {
            request: FieldRequest::new(endpoint, fields),
            kind,
        }
    }

    #[test]
    fn test_static_gets_sentinel_date() {
        let frame = df! {
            "ts_code" => ["A", "B", "Z"],
            "list_status" => ["L", "L", "D"],
            "reg_capital" => [100.0, 200.0, 300.0],
        }
        .unwrap();
        let responses = RawResponses {
            symbols: vec!["A".into(), "B".into()],
            static_frames: vec![(
                classified("stock_company", &["reg_capital", "list_status"], EndpointKind::STATIC),
                frame,
            )],
            ..RawResponses::default()
        };
        let records = ResponseUnifier::new().unify(&responses);

        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.date == sentinel_date()));
        assert!(records.iter().all(|r| r.symbol != "Z"));
        let status = records.iter().find(|r| r.field == "list_status").unwrap();
        assert_eq!(status.value, None);
    }

    #[test]
    fn test_periodic_uses_end_date() {
        let frame = df! {
            "ts_code" => ["A", "A"],
            "end_date" => ["20231231", "20240331"],
            "revenue" => [1.0e9, 2.5e8],
        }
        .unwrap();
        let mut periodic = BTreeMap::new();
        periodic.insert(
            "A".to_string(),
            vec![(classified("income", &["end_date", "revenue"], EndpointKind::PERIODIC), frame)],
        );
        let records = ResponseUnifier::new().unify(&RawResponses {
            periodic,
            ..RawResponses::default()
        });

        assert_eq!(
            records,
            vec![
                LongRecord::new("A", d(2023, 12, 31), "revenue", Some(1.0e9)),
                LongRecord::new("A", d(2024, 3, 31), "revenue", Some(2.5e8)),
            ]
        );
    }

    #[test]
    fn test_time_series_left_join_and_suffix() {
        let bars = df! {
            "ts_code" => ["A", "A"],
            "trade_date" => ["20240102", "20240103"],
            "open" => [10.0, 10.2],
            "close" => [10.1, 10.3],
            "vol" => [1000.0, 1200.0],
        }
        .unwrap();
        let basic = df! {
            "ts_code" => ["A", "A", "A"],
            "trade_date" => ["20240102", "20240103", "20240104"],
            "pe" => [5.0, 5.1, 5.2],
            "close" => [99.0, 99.0, 99.0],
        }
        .unwrap();

        let mut time_series = BTreeMap::new();
        time_series.insert(
            "A".to_string(),
            vec![
                (
                    ClassifiedRequest {
                        request: FieldRequest::new("pro_bar", &["open", "close"])
                            .with_adjustment(AdjustmentMode::Forward),
                        kind: EndpointKind::BARS,
                    },
                    bars,
                ),
                (classified("daily_basic", &["pe"], EndpointKind::DAILY), basic),
            ],
        );
        let records = ResponseUnifier::new().unify(&RawResponses {
            time_series,
            ..RawResponses::default()
        });

        let fields: BTreeSet<&str> = records.iter().map(|r| r.field.as_str()).collect();
        assert_eq!(fields, BTreeSet::from(["open_qfq", "close_qfq", "pe"]));
        // 2024-01-04 is not in the first endpoint's keys
        assert!(records.iter().all(|r| r.date != d(2024, 1, 4)));
        assert_eq!(records.len(), 6);
    }

    #[test]
    fn test_duplicate_columns_keep_first_endpoint() {
        let first = df! {
            "ts_code" => ["A"],
            "trade_date" => ["20240102"],
            "close" => [10.0],
        }
        .unwrap();
        let second = df! {
            "ts_code" => ["A"],
            "trade_date" => ["20240102"],
            "close" => [99.0],
        }
        .unwrap();
        let mut time_series = BTreeMap::new();
        time_series.insert(
            "A".to_string(),
            vec![
                (classified("daily", &["close"], EndpointKind::DAILY), first),
                (classified("daily_basic", &["close"], EndpointKind::DAILY), second),
            ],
        );
        let records = ResponseUnifier::new().unify(&RawResponses {
            time_series,
            ..RawResponses::default()
        });
        assert_eq!(records, vec![LongRecord::new("A", d(2024, 1, 2), "close", Some(10.0))]);
    }

    #[test]
    fn test_empty_first_endpoint_falls_through() {
        let empty = DataFrame::default();
        let basic = df! {
            "ts_code" => ["A"],
            "trade_date" => ["20240102"],
            "pe" => [5.0],
        }
        .unwrap();
        let mut time_series = BTreeMap::new();
        time_series.insert(
            "A".to_string(),
            vec![
                (classified("daily", &["close"], EndpointKind::DAILY), empty),
                (classified("daily_basic", &["pe"], EndpointKind::DAILY), basic),
            ],
        );
        let records = ResponseUnifier::new().unify(&RawResponses {
            time_series,
            ..RawResponses::default()
        });
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field, "pe");
    }

    #[test]
    fn test_round_trip_to_wide() {
        let bars = df! {
            "ts_code" => ["A", "A", "A"],
            "trade_date" => ["20240102", "20240103", "20240104"],
            "close" => [10.0, 10.5, 10.25],
            "vol" => [1.0, 2.0, 3.0],
        }
        .unwrap();
        let mut time_series = BTreeMap::new();
        time_series.insert(
            "A".to_string(),
            vec![(classified("daily", &["close", "vol"], EndpointKind::DAILY), bars.clone())],
        );
        let records = ResponseUnifier::new().unify(&RawResponses {
            time_series,
            ..RawResponses::default()
        });
        let wide = WideFrame::from_records(&records).unwrap();

        let closes = column_values(&bars, "close").unwrap();
        let vols = column_values(&bars, "vol").unwrap();
        let dates = column_dates(&bars, "trade_date").unwrap();
        for ((date, close), vol) in dates.into_iter().zip(closes).zip(vols) {
            let date = date.unwrap();
            assert_eq!(wide.value("A", date, "close"), close);
            assert_eq!(wide.value("A", date, "vol"), vol);
        }
        assert_eq!(wide.len(), 3);
    }

    #[test]
    fn test_missing_symbol_column_is_isolated() {
        let broken = df! { "close" => [1.0] }.unwrap();
        let good = df! {
            "ts_code" => ["A"],
            "end_date" => ["20231231"],
            "holder_num" => [1000.0],
        }
        .unwrap();
        let mut periodic = BTreeMap::new();
        periodic.insert(
            "A".to_string(),
            vec![
                (classified("income", &["end_date", "close"], EndpointKind::PERIODIC), broken),
                (
                    classified("stk_holdernumber", &["end_date", "holder_num"], EndpointKind::PERIODIC),
                    good,
                ),
            ],
        );
        let records = ResponseUnifier::new().unify(&RawResponses {
            periodic,
            ..RawResponses::default()
        });
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field, "holder_num");
    }
}
