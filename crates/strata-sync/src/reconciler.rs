//! Detection and repair of retroactive adjustment-factor revisions.
//!
//! A forward-adjusted history is only valid for the factor it was computed
//! against. When the provider's factor for a symbol's latest stored date no
//! longer matches the stored one, the whole forward-adjusted history of that
//! symbol is refetched and overwritten.

use crate::price::{FACTOR_COLUMN, FACTOR_ENDPOINT, fetch_price_rows};
use chrono::{Duration, Local};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, sync::Arc};
use strata_store::{UpsertGateway, UpsertOutcome, catalog};
use strata_traits::{
    AdjustmentMode, DataProvider, Date, QueryParams, Result, Symbol,
    frame::{column_dates, column_strings, column_values},
};
use tracing::{debug, info, warn};

/// Reconciliation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// A symbol is active if its latest stored date is within this many days of today.
    pub active_window_days: i64,
    /// Relative tolerance for factor comparison.
    pub rel_tol: f64,
    /// Absolute tolerance for factor comparison.
    pub abs_tol: f64,
    /// Fixed "today"; the local date when `None`.
    pub as_of: Option<Date>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            active_window_days: 90,
            rel_tol: 1e-5,
            abs_tol: 1e-8,
            as_of: None,
        }
    }
}

impl ReconcileConfig {
    /// The date treated as today.
    pub fn today(&self) -> Date {
        self.as_of.unwrap_or_else(|| Local::now().date_naive())
    }

    /// First date of the active window.
    pub fn active_since(&self) -> Date {
        self.today() - Duration::days(self.active_window_days)
    }
}

/// Returns true if `stored` and `current` agree within tolerance.
pub fn within_tolerance(stored: f64, current: f64, rel_tol: f64, abs_tol: f64) -> bool {
    (stored - current).abs() <= abs_tol + rel_tol * current.abs()
}

/// Stored date range and latest factor of one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSpan {
    /// The symbol.
    pub symbol: Symbol,
    /// Oldest stored trade date.
    pub oldest: Date,
    /// Latest stored trade date.
    pub latest: Date,
    /// Stored factor on `latest`.
    pub factor: Option<f64>,
}

/// Where a symbol ended up after a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolState {
    /// Latest date outside the active window; not checked.
    Inactive,
    /// Stored factor matches the provider.
    Clean,
    /// The provider had no factor for the latest date.
    Unverified,
    /// Drift detected and the history rewritten.
    Refreshed,
    /// The check or the refresh failed.
    Failed,
}

impl fmt::Display for SymbolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Inactive => "inactive",
            Self::Clean => "clean",
            Self::Unverified => "unverified",
            Self::Refreshed => "refreshed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Sweeps a price table for adjustment drift.
#[derive(Debug, Clone)]
pub struct AdjustmentReconciler {
    provider: Arc<dyn DataProvider>,
    gateway: UpsertGateway,
    config: ReconcileConfig,
}

impl AdjustmentReconciler {
    /// Create a reconciler with default settings.
    pub fn new(provider: Arc<dyn DataProvider>, gateway: UpsertGateway) -> Self {
        Self::with_config(provider, gateway, ReconcileConfig::default())
    }

    /// Create a reconciler with explicit settings.
    pub const fn with_config(
        provider: Arc<dyn DataProvider>,
        gateway: UpsertGateway,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            provider,
            gateway,
            config,
        }
    }

    /// Settings in use.
    pub const fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Stored span and latest factor of every symbol in `table`.
    ///
    /// # Errors
    ///
    /// Returns the store error if the table cannot be read.
    pub fn spans(&self, table: &str) -> Result<Vec<SymbolSpan>> {
        let sql = format!(
            "SELECT t.ts_code, m.oldest, m.latest, t.{FACTOR_COLUMN} AS factor \
             FROM {table} t \
             JOIN (SELECT ts_code, MIN(trade_date) AS oldest, MAX(trade_date) AS latest \
                   FROM {table} GROUP BY ts_code) m \
             ON t.ts_code = m.ts_code AND t.trade_date = m.latest \
             ORDER BY t.ts_code"
        );
        let frame = self.gateway.store().read(&sql)?;
        if frame.height() == 0 {
            return Ok(Vec::new());
        }

        let symbols = column_strings(&frame, "ts_code")?;
        let oldest = column_dates(&frame, "oldest")?;
        let latest = column_dates(&frame, "latest")?;
        let factors = column_values(&frame, "factor")?;
        Ok(symbols
            .into_iter()
            .zip(oldest)
            .zip(latest)
            .zip(factors)
            .filter_map(|(((symbol, oldest), latest), factor)| {
                Some(SymbolSpan {
                    symbol: symbol?,
                    oldest: oldest?,
                    latest: latest?,
                    factor,
                })
            })
            .collect())
    }

    /// Check every symbol in `table` and refresh the drifted ones.
    ///
    /// # Errors
    ///
    /// Fails only if the table cannot be read; per-symbol failures are logged
    /// and reported as [`SymbolState::Failed`].
    pub async fn sweep(&self, table: &str) -> Result<BTreeMap<Symbol, SymbolState>> {
        let spans = self.spans(table)?;
        Ok(self.sweep_spans(table, &spans).await)
    }

    /// Check the given spans and refresh the drifted symbols.
    ///
    /// Each span is compared on its own `latest` date and refreshed from its
    /// own `oldest` date, so spans read before rows were appended still check
    /// the dates whose forward-adjusted history is stored.
    pub async fn sweep_spans(&self, table: &str, spans: &[SymbolSpan]) -> BTreeMap<Symbol, SymbolState> {
        let since = self.config.active_since();
        let today = self.config.today();
        let mut states = BTreeMap::new();

        for span in spans {
            let state = if span.latest < since {
                SymbolState::Inactive
            } else {
                match self.check(span).await {
                    Ok(Some(true)) => SymbolState::Clean,
                    Ok(None) => SymbolState::Unverified,
                    Ok(Some(false)) => self.refresh(table, span, today).await,
                    Err(err) => {
                        warn!(symbol = %span.symbol, error = %err, "factor check failed");
                        SymbolState::Failed
                    }
                }
            };
            states.insert(span.symbol.clone(), state);
        }

        let refreshed = states.values().filter(|s| **s == SymbolState::Refreshed).count();
        info!(table, symbols = states.len(), refreshed, "adjustment sweep finished");
        states
    }

    /// Check `table` and return the refreshed symbols.
    ///
    /// # Errors
    ///
    /// See [`sweep`](Self::sweep).
    pub async fn reconcile(&self, table: &str) -> Result<Vec<Symbol>> {
        let spans = self.spans(table)?;
        Ok(self.reconcile_spans(table, &spans).await)
    }

    /// Check the given spans and return the refreshed symbols.
    pub async fn reconcile_spans(&self, table: &str, spans: &[SymbolSpan]) -> Vec<Symbol> {
        self.sweep_spans(table, spans)
            .await
            .into_iter()
            .filter(|(_, state)| *state == SymbolState::Refreshed)
            .map(|(symbol, _)| symbol)
            .collect()
    }

    /// Reconcile the default price table.
    ///
    /// # Errors
    ///
    /// See [`sweep`](Self::sweep).
    pub async fn reconcile_prices(&self) -> Result<Vec<Symbol>> {
        self.reconcile(catalog::PRICE_TABLE).await
    }

    /// The provider's current factor for `symbol` on `date`.
    ///
    /// # Errors
    ///
    /// Propagates the provider failure.
    pub async fn current_factor(&self, symbol: &str, date: Date) -> Result<Option<f64>> {
        let params = QueryParams::for_symbol(symbol)
            .on(date)
            .with_fields(&["ts_code", "trade_date", FACTOR_COLUMN]);
        let frame = self.provider.query(FACTOR_ENDPOINT, &params).await?;
        if frame.height() == 0 {
            return Ok(None);
        }
        let dates = column_dates(&frame, "trade_date")?;
        let values = column_values(&frame, FACTOR_COLUMN)?;
        Ok(dates
            .into_iter()
            .zip(values)
            .find(|(d, _)| *d == Some(date))
            .and_then(|(_, v)| v))
    }

    /// `Some(true)` if clean, `Some(false)` if drifted, `None` if the provider has no factor.
    async fn check(&self, span: &SymbolSpan) -> Result<Option<bool>> {
        let Some(current) = self.current_factor(&span.symbol, span.latest).await? else {
            warn!(symbol = %span.symbol, date = %span.latest, "provider has no factor for latest date");
            return Ok(None);
        };
        let clean = span
            .factor
            .is_some_and(|stored| within_tolerance(stored, current, self.config.rel_tol, self.config.abs_tol));
        if !clean {
            info!(
                symbol = %span.symbol,
                stored = ?span.factor,
                current,
                "AdjustmentDriftDetected"
            );
        } else {
            debug!(symbol = %span.symbol, "factor unchanged");
        }
        Ok(Some(clean))
    }

    async fn refresh(&self, table: &str, span: &SymbolSpan, today: Date) -> SymbolState {
        let rows = fetch_price_rows(
            self.provider.as_ref(),
            &span.symbol,
            span.oldest,
            today,
            &[AdjustmentMode::Forward],
        )
        .await;
        let rows = match rows {
            Ok(rows) if rows.height() > 0 => rows,
            Ok(_) => {
                warn!(symbol = %span.symbol, "refresh returned no bars");
                return SymbolState::Failed;
            }
            Err(err) => {
                warn!(symbol = %span.symbol, error = %err, "refresh fetch failed");
                return SymbolState::Failed;
            }
        };

        match self.gateway.upsert(table, &rows, &catalog::PRICE_KEY) {
            UpsertOutcome::Written { rows } => {
                info!(symbol = %span.symbol, rows, from = %span.oldest, "forward-adjusted history refreshed");
                SymbolState::Refreshed
            }
            UpsertOutcome::Skipped => SymbolState::Failed,
            UpsertOutcome::Failed(err) => {
                warn!(symbol = %span.symbol, error = %err, "refresh write failed");
                SymbolState::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use polars::prelude::*;
    use strata_store::{DuckDbStore, SchemaCatalog};
    use strata_traits::RelationalStore;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    fn config() -> ReconcileConfig {
        ReconcileConfig {
            as_of: Some(d(2024, 1, 10)),
            ..ReconcileConfig::default()
        }
    }

    /// A clean, B drifted, C inactive, D stored without a factor.
    fn seeded_gateway() -> UpsertGateway {
        let store: Arc<dyn RelationalStore> = Arc::new(DuckDbStore::in_memory().unwrap());
        let gateway = UpsertGateway::new(store, SchemaCatalog::default());
        let rows = df! {
            "ts_code" => ["A", "A", "B", "B", "C", "D"],
            "trade_date" => [d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 2), d(2024, 1, 3), d(2023, 6, 1), d(2024, 1, 3)],
            "close" => [10.0, 10.2, 20.0, 20.4, 30.0, 40.0],
            "adj_factor" => [Some(1.0), Some(1.0), Some(2.0), Some(2.0), Some(3.0), None],
            "close_qfq" => [10.0, 10.2, 20.0, 20.4, 30.0, 40.0],
        }
        .unwrap();
        assert!(gateway.upsert(catalog::PRICE_TABLE, &rows, &catalog::PRICE_KEY).is_ok());
        gateway
    }

    fn provider() -> ScriptedProvider {
        let factors = df! {
            "ts_code" => ["A", "B", "C", "D"],
            "trade_date" => ["20240103", "20240103", "20230601", "20240103"],
            "adj_factor" => [1.000_000_001, 2.5, 9.0, 4.0],
        }
        .unwrap();
        let qfq_bars = df! {
            "ts_code" => ["B", "B", "D"],
            "trade_date" => ["20240102", "20240103", "20240103"],
            "close" => [16.0, 20.4, 40.0],
            "adj_factor" => [2.0, 2.5, 4.0],
        }
        .unwrap();
        ScriptedProvider::new()
            .with_frame(FACTOR_ENDPOINT, factors)
            .with_adjusted("pro_bar", AdjustmentMode::Forward, qfq_bars)
    }

    #[test]
    fn test_tolerance() {
        assert!(within_tolerance(1.0, 1.000_001, 1e-5, 1e-8));
        assert!(!within_tolerance(1.0, 1.1, 1e-5, 1e-8));
        assert!(within_tolerance(0.0, 0.0, 1e-5, 1e-8));
    }

    #[test]
    fn test_active_window() {
        assert_eq!(config().active_since(), d(2023, 10, 12));
    }

    #[test]
    fn test_spans() {
        let reconciler =
            AdjustmentReconciler::with_config(Arc::new(provider()), seeded_gateway(), config());
        let spans = reconciler.spans(catalog::PRICE_TABLE).unwrap();
        assert_eq!(spans.len(), 4);
        assert_eq!(
            spans[1],
            SymbolSpan {
                symbol: "B".into(),
                oldest: d(2024, 1, 2),
                latest: d(2024, 1, 3),
                factor: Some(2.0),
            }
        );
        assert_eq!(spans[3].factor, None);
    }

    #[tokio::test]
    async fn test_drift_triggers_full_refresh() {
        let provider = Arc::new(provider());
        let gateway = seeded_gateway();
        let reconciler = AdjustmentReconciler::with_config(provider.clone(), gateway.clone(), config());

        let states = reconciler.sweep(catalog::PRICE_TABLE).await.unwrap();
        assert_eq!(states["A"], SymbolState::Clean);
        assert_eq!(states["B"], SymbolState::Refreshed);
        assert_eq!(states["C"], SymbolState::Inactive);
        assert_eq!(states["D"], SymbolState::Refreshed);

        // C is never checked
        let checked: Vec<String> = provider
            .calls_to(FACTOR_ENDPOINT)
            .into_iter()
            .filter_map(|p| p.symbol)
            .collect();
        assert_eq!(checked, vec!["A", "B", "D"]);

        // refresh spans oldest stored date to today
        let refreshes = provider.calls_to("pro_bar");
        assert_eq!(refreshes.len(), 2);
        assert_eq!(refreshes[0].symbol.as_deref(), Some("B"));
        assert_eq!(refreshes[0].start_date, Some(d(2024, 1, 2)));
        assert_eq!(refreshes[0].end_date, Some(d(2024, 1, 10)));
        assert_eq!(refreshes[0].adjustment, AdjustmentMode::Forward);

        let stored = gateway
            .store()
            .read("SELECT close, close_qfq, adj_factor FROM stock_daily WHERE ts_code = 'B' ORDER BY trade_date")
            .unwrap();
        assert_eq!(column_values(&stored, "close_qfq").unwrap(), vec![Some(16.0), Some(20.4)]);
        assert_eq!(column_values(&stored, "adj_factor").unwrap(), vec![Some(2.0), Some(2.5)]);
        // unadjusted columns are left alone
        assert_eq!(column_values(&stored, "close").unwrap(), vec![Some(20.0), Some(20.4)]);
    }

    #[tokio::test]
    async fn test_reconcile_lists_refreshed() {
        let reconciler =
            AdjustmentReconciler::with_config(Arc::new(provider()), seeded_gateway(), config());
        let refreshed = reconciler.reconcile(catalog::PRICE_TABLE).await.unwrap();
        assert_eq!(refreshed, vec!["B", "D"]);
    }

    #[tokio::test]
    async fn test_provider_failure_is_isolated() {
        let provider = Arc::new(ScriptedProvider::new().failing(FACTOR_ENDPOINT));
        let reconciler = AdjustmentReconciler::with_config(provider, seeded_gateway(), config());
        let states = reconciler.sweep(catalog::PRICE_TABLE).await.unwrap();
        assert_eq!(states["A"], SymbolState::Failed);
        assert_eq!(states["C"], SymbolState::Inactive);
    }

    #[tokio::test]
    async fn test_missing_table_is_an_error() {
        let store: Arc<dyn RelationalStore> = Arc::new(DuckDbStore::in_memory().unwrap());
        let gateway = UpsertGateway::new(store, SchemaCatalog::default());
        let reconciler = AdjustmentReconciler::with_config(Arc::new(provider()), gateway, config());
        assert!(reconciler.reconcile(catalog::PRICE_TABLE).await.is_err());
    }
}
