//! Per-date IC of stored factor values against next-period returns.

use crate::ic::{pearson_ic, spearman_ic};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use strata_store::catalog;
use strata_sync::{LongLayout, long::frame_to_records};
use strata_traits::{
    Date, RelationalStore, Result, StrataError, Symbol,
    frame::{DATE_COLUMN, SYMBOL_COLUMN, column_dates, column_strings, column_values},
    store::{quote_list, quote_literal},
};
use tracing::{debug, info, warn};

/// Price columns tried in order when computing returns.
pub const PRICE_COLUMNS: [&str; 2] = ["close_qfq", "close"];

/// IC analysis settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcConfig {
    /// Dates with fewer paired observations are skipped (default: 3).
    pub min_observations: usize,
    /// Long table holding factor values.
    pub factor_table: String,
    /// Wide price table.
    pub price_table: String,
}

impl Default for IcConfig {
    fn default() -> Self {
        Self {
            min_observations: 3,
            factor_table: catalog::FACTOR_TABLE.to_string(),
            price_table: catalog::PRICE_TABLE.to_string(),
        }
    }
}

/// Values keyed by `(date, symbol)`.
pub type Panel = BTreeMap<(Date, Symbol), f64>;

/// Return from each date's close to the symbol's next close.
///
/// The last observation of every symbol has no return.
pub fn forward_returns(prices: &BTreeMap<Symbol, Vec<(Date, f64)>>) -> Panel {
    let mut out = Panel::new();
    for (symbol, series) in prices {
        for pair in series.windows(2) {
            let ((date, today), (_, next)) = (pair[0], pair[1]);
            if today != 0.0 {
                out.insert((date, symbol.clone()), next / today - 1.0);
            }
        }
    }
    out
}

/// IC for one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyIc {
    /// Cross-section date.
    pub date: Date,
    /// Pearson IC.
    pub ic: f64,
    /// Spearman rank IC.
    pub rank_ic: f64,
    /// Paired observations used.
    pub observations: usize,
}

/// Pair factor values with forward returns date by date and correlate them.
pub fn daily_ic(factor: &Panel, returns: &Panel, min_observations: usize) -> Vec<DailyIc> {
    let mut by_date: BTreeMap<Date, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for (key, value) in factor {
        if let Some(ret) = returns.get(key) {
            let (values, rets) = by_date.entry(key.0).or_default();
            values.push(*value);
            rets.push(*ret);
        }
    }

    let mut out = Vec::with_capacity(by_date.len());
    for (date, (values, rets)) in by_date {
        if values.len() < min_observations {
            debug!(%date, observations = values.len(), "cross-section too small, skipped");
            continue;
        }
        let values = Array1::from(values);
        let rets = Array1::from(rets);
        out.push(DailyIc {
            date,
            ic: pearson_ic(&values, &rets),
            rank_ic: spearman_ic(&values, &rets),
            observations: values.len(),
        });
    }
    out
}

/// Summary statistics of an IC series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IcSummary {
    /// Mean IC.
    pub mean: f64,
    /// Sample standard deviation (0 with fewer than two periods).
    pub std: f64,
    /// `mean / std`, 0 when undefined.
    pub ic_ir: f64,
    /// `ic_ir * sqrt(periods)`.
    pub t_stat: f64,
    /// Share of periods with a positive IC.
    pub positive_ratio: f64,
    /// Periods with a finite IC.
    pub periods: usize,
}

impl IcSummary {
    /// Summarise a series; non-finite entries are ignored.
    pub fn from_series(series: &[f64]) -> Self {
        let valid: Vec<f64> = series.iter().copied().filter(|x| x.is_finite()).collect();
        let periods = valid.len();
        if periods == 0 {
            return Self {
                mean: f64::NAN,
                std: f64::NAN,
                ic_ir: f64::NAN,
                t_stat: f64::NAN,
                positive_ratio: f64::NAN,
                periods,
            };
        }

        let n = periods as f64;
        let mean = valid.iter().sum::<f64>() / n;
        let std = if periods < 2 {
            0.0
        } else {
            (valid.iter().map(|ic| (ic - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        };
        let ic_ir = if std > 0.0 { mean / std } else { 0.0 };

        Self {
            mean,
            std,
            ic_ir,
            t_stat: ic_ir * n.sqrt(),
            positive_ratio: valid.iter().filter(|ic| **ic > 0.0).count() as f64 / n,
            periods,
        }
    }
}

/// Full result for one factor.
#[derive(Debug, Clone, Serialize)]
pub struct IcReport {
    /// Factor name.
    pub factor: String,
    /// Price column the returns were computed from.
    pub price_column: String,
    /// Pearson IC summary.
    pub ic: IcSummary,
    /// Spearman rank IC summary.
    pub rank_ic: IcSummary,
    /// Per-date values.
    pub daily: Vec<DailyIc>,
}

impl IcReport {
    /// Build the report from per-date values.
    pub fn new(factor: impl Into<String>, price_column: impl Into<String>, daily: Vec<DailyIc>) -> Self {
        let ics: Vec<f64> = daily.iter().map(|d| d.ic).collect();
        let rank_ics: Vec<f64> = daily.iter().map(|d| d.rank_ic).collect();
        Self {
            factor: factor.into(),
            price_column: price_column.into(),
            ic: IcSummary::from_series(&ics),
            rank_ic: IcSummary::from_series(&rank_ics),
            daily,
        }
    }
}

/// Reads a stored factor and the price table and computes its IC.
#[derive(Debug, Clone)]
pub struct IcAnalyzer {
    store: Arc<dyn RelationalStore>,
    config: IcConfig,
}

impl IcAnalyzer {
    /// Analyzer with the default tables.
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self::with_config(store, IcConfig::default())
    }

    /// Analyzer with explicit settings.
    pub const fn with_config(store: Arc<dyn RelationalStore>, config: IcConfig) -> Self {
        Self { store, config }
    }

    /// Active settings.
    pub const fn config(&self) -> &IcConfig {
        &self.config
    }

    /// Analyse `factor_name` over the optional date window.
    ///
    /// Returns for the last factor date use the first price after the window.
    ///
    /// # Errors
    ///
    /// Fails if either table cannot be read, no values are stored for the
    /// factor, or the price table has neither `close_qfq` nor `close`.
    pub fn analyze(
        &self,
        factor_name: &str,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<IcReport> {
        let factor = self.load_factor(factor_name, start, end)?;
        if factor.is_empty() {
            return Err(StrataError::InsufficientData(format!(
                "no stored values for factor '{factor_name}'"
            )));
        }
        let mut symbols: Vec<&str> = factor.keys().map(|(_, s)| s.as_str()).collect();
        symbols.sort_unstable();
        symbols.dedup();

        let (price_column, prices) = self.load_prices(&symbols, start)?;
        let returns = forward_returns(&prices);
        let daily = daily_ic(&factor, &returns, self.config.min_observations);
        if daily.is_empty() {
            warn!(
                factor = factor_name,
                min_observations = self.config.min_observations,
                "no date has enough paired observations"
            );
        }

        let report = IcReport::new(factor_name, price_column, daily);
        info!(
            factor = factor_name,
            periods = report.ic.periods,
            ic = report.ic.mean,
            rank_ic = report.rank_ic.mean,
            "IC analysis complete"
        );
        Ok(report)
    }

    fn load_factor(&self, factor_name: &str, start: Option<Date>, end: Option<Date>) -> Result<Panel> {
        let layout = LongLayout::FACTOR;
        let mut sql = format!(
            "SELECT {SYMBOL_COLUMN}, {DATE_COLUMN}, {}, {} FROM {} WHERE {} = {}",
            layout.name_column,
            layout.value_column,
            self.config.factor_table,
            layout.name_column,
            quote_literal(factor_name),
        );
        if let Some(start) = start {
            sql.push_str(&format!(" AND {DATE_COLUMN} >= DATE '{start}'"));
        }
        if let Some(end) = end {
            sql.push_str(&format!(" AND {DATE_COLUMN} <= DATE '{end}'"));
        }

        let rows = self.store.read(&sql)?;
        Ok(frame_to_records(&rows, layout)?
            .into_iter()
            .filter_map(|r| Some(((r.date, r.symbol), r.value?)))
            .collect())
    }

    fn load_prices(
        &self,
        symbols: &[&str],
        start: Option<Date>,
    ) -> Result<(&'static str, BTreeMap<Symbol, Vec<(Date, f64)>>)> {
        let mut last_err = None;
        for price_column in PRICE_COLUMNS {
            let mut sql = format!(
                "SELECT {SYMBOL_COLUMN}, {DATE_COLUMN}, {price_column} FROM {} WHERE {SYMBOL_COLUMN} IN {}",
                self.config.price_table,
                quote_list(symbols),
            );
            if let Some(start) = start {
                sql.push_str(&format!(" AND {DATE_COLUMN} >= DATE '{start}'"));
            }
            match self.store.read(&sql) {
                Ok(rows) => return Ok((price_column, price_series(&rows, price_column)?)),
                Err(err) => {
                    warn!(table = %self.config.price_table, column = price_column, error = %err, "price column unavailable");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| StrataError::MissingColumn(PRICE_COLUMNS.join(" or "))))
    }
}

fn price_series(rows: &polars::prelude::DataFrame, column: &str) -> Result<BTreeMap<Symbol, Vec<(Date, f64)>>> {
    let mut out: BTreeMap<Symbol, Vec<(Date, f64)>> = BTreeMap::new();
    if rows.height() == 0 {
        return Ok(out);
    }
    let symbols = column_strings(rows, SYMBOL_COLUMN)?;
    let dates = column_dates(rows, DATE_COLUMN)?;
    let values = column_values(rows, column)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use polars::df;
    use strata_store::{DuckDbStore, SchemaCatalog, UpsertGateway};
    use strata_sync::long::records_to_frame;
    use strata_traits::LongRecord;

    fn d(day: u32) -> Date {
        Date::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn series(points: &[(u32, f64)]) -> Vec<(Date, f64)> {
        points.iter().map(|(day, p)| (d(*day), *p)).collect()
    }

    #[test]
    fn test_forward_returns_shift_next_close() {
        let mut prices = BTreeMap::new();
        prices.insert("A".to_string(), series(&[(2, 10.0), (3, 11.0), (4, 9.9)]));
        let returns = forward_returns(&prices);
        assert_eq!(returns.len(), 2);
        assert_relative_eq!(returns[&(d(2), "A".to_string())], 0.1, epsilon = 1e-12);
        assert_relative_eq!(returns[&(d(3), "A".to_string())], -0.1, epsilon = 1e-12);
        assert!(!returns.contains_key(&(d(4), "A".to_string())));
    }

    #[test]
    fn test_daily_ic_skips_small_cross_sections() {
        let mut factor = Panel::new();
        let mut returns = Panel::new();
        for (i, symbol) in ["A", "B", "C"].iter().enumerate() {
            factor.insert((d(2), symbol.to_string()), i as f64);
            returns.insert((d(2), symbol.to_string()), 0.01 * i as f64);
        }
        factor.insert((d(3), "A".to_string()), 1.0);
        factor.insert((d(3), "B".to_string()), 2.0);
        returns.insert((d(3), "A".to_string()), 0.01);
        returns.insert((d(3), "B".to_string()), 0.02);

        let out = daily_ic(&factor, &returns, 3);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].date, d(2));
        assert_eq!(out[0].observations, 3);
        assert_relative_eq!(out[0].rank_ic, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_summary_statistics() {
        let summary = IcSummary::from_series(&[0.1, 0.3, -0.1, f64::NAN]);
        assert_eq!(summary.periods, 3);
        assert_relative_eq!(summary.mean, 0.1, epsilon = 1e-12);
        assert_relative_eq!(summary.std, 0.2, epsilon = 1e-12);
        assert_relative_eq!(summary.ic_ir, 0.5, epsilon = 1e-12);
        assert_relative_eq!(summary.t_stat, 0.5 * 3f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(summary.positive_ratio, 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_summary_single_period() {
        let summary = IcSummary::from_series(&[0.2]);
        assert_eq!(summary.std, 0.0);
        assert_eq!(summary.ic_ir, 0.0);
        assert!(IcSummary::from_series(&[]).mean.is_nan());
    }

    fn seeded_store() -> Arc<dyn RelationalStore> {
        let store: Arc<dyn RelationalStore> = Arc::new(DuckDbStore::in_memory().unwrap());
        let gateway = UpsertGateway::new(store.clone(), SchemaCatalog::default());

        // factor ranks match the next-day return ranks on both dates
        let mut records = Vec::new();
        for (i, symbol) in ["A", "B", "C", "D"].iter().enumerate() {
            records.push(LongRecord::new(*symbol, d(2), "bp", Some(i as f64)));
            records.push(LongRecord::new(*symbol, d(3), "bp", Some(i as f64)));
        }
        records.push(LongRecord::new("A", d(2), "other", Some(9.0)));
        let rows = records_to_frame(&records, LongLayout::FACTOR).unwrap();
        assert!(gateway.upsert(catalog::FACTOR_TABLE, &rows, &LongLayout::FACTOR.key()).is_ok());

        let prices = df! {
            "ts_code" => ["A", "B", "C", "D", "A", "B", "C", "D", "A", "B", "C", "D"],
            "trade_date" => [d(2), d(2), d(2), d(2), d(3), d(3), d(3), d(3), d(4), d(4), d(4), d(4)],
            "close_qfq" => [10.0, 10.0, 10.0, 10.0, 10.1, 10.2, 10.3, 10.4, 10.1, 10.3, 10.6, 10.9],
        }
        .unwrap();
        assert!(gateway.upsert(catalog::PRICE_TABLE, &prices, &catalog::PRICE_KEY).is_ok());
        store
    }

    #[test]
    fn test_analyze_stored_factor() {
        let analyzer = IcAnalyzer::new(seeded_store());
        let report = analyzer.analyze("bp", None, None).unwrap();
        assert_eq!(report.price_column, "close_qfq");
        assert_eq!(report.daily.len(), 2);
        assert_relative_eq!(report.rank_ic.mean, 1.0, epsilon = 1e-12);
        assert_eq!(report.rank_ic.positive_ratio, 1.0);
    }

    #[test]
    fn test_analyze_window_uses_later_prices() {
        let analyzer = IcAnalyzer::new(seeded_store());
        let report = analyzer.analyze("bp", Some(d(3)), Some(d(3))).unwrap();
        assert_eq!(report.daily.len(), 1);
        assert_eq!(report.daily[0].date, d(3));
    }

    #[test]
    fn test_analyze_unknown_factor() {
        let analyzer = IcAnalyzer::new(seeded_store());
        assert!(matches!(
            analyzer.analyze("missing", None, None),
            Err(StrataError::InsufficientData(_))
        ));
    }
}
