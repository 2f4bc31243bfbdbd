//! The daily price-table maintenance job.

use crate::{
    price::{ALL_MODES, fetch_price_rows},
    reconciler::{AdjustmentReconciler, ReconcileConfig, SymbolSpan},
};
use chrono::Duration;
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};
use strata_store::{UpsertGateway, UpsertOutcome, catalog};
use strata_traits::{DataProvider, Date, Result, Symbol};
use tracing::{info, warn};

/// Outcome of an incremental update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    /// Symbols that received new rows.
    pub updated: Vec<Symbol>,
    /// Symbols already current.
    pub current: Vec<Symbol>,
    /// Symbols whose fetch or write failed.
    pub failed: Vec<Symbol>,
    /// Rows written in total.
    pub rows: usize,
}

/// Outcome of a full daily run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DailyReport {
    /// Incremental update step.
    pub update: UpdateReport,
    /// Symbols whose forward-adjusted history was rewritten.
    pub refreshed: Vec<Symbol>,
}

/// Appends new bars to a price table and then reconciles adjustments.
#[derive(Debug, Clone)]
pub struct DailyUpdater {
    provider: Arc<dyn DataProvider>,
    gateway: UpsertGateway,
    reconciler: AdjustmentReconciler,
}

enum Fetched {
    Written(usize),
    Empty,
    Failed,
}

impl DailyUpdater {
    /// Create an updater; `config` drives both the active window and reconciliation.
    pub fn new(provider: Arc<dyn DataProvider>, gateway: UpsertGateway, config: ReconcileConfig) -> Self {
        let reconciler = AdjustmentReconciler::with_config(provider.clone(), gateway.clone(), config);
        Self {
            provider,
            gateway,
            reconciler,
        }
    }

    /// The reconciler used after the update.
    pub const fn reconciler(&self) -> &AdjustmentReconciler {
        &self.reconciler
    }

    /// Fetch bars after each active symbol's latest stored date up to today.
    ///
    /// # Errors
    ///
    /// Fails only if the table cannot be read.
    pub async fn update_incremental(&self, table: &str) -> Result<UpdateReport> {
        let spans = self.reconciler.spans(table)?;
        Ok(self.update_from_spans(table, &spans).await)
    }

    /// Fetch bars after each active span's `latest` date up to today.
    pub async fn update_from_spans(&self, table: &str, spans: &[SymbolSpan]) -> UpdateReport {
        let config = self.reconciler.config();
        let since = config.active_since();
        let today = config.today();

        let mut by_latest: BTreeMap<Date, Vec<&str>> = BTreeMap::new();
        for span in spans {
            if span.latest >= since {
                by_latest.entry(span.latest).or_default().push(&span.symbol);
            }
        }

        let mut report = UpdateReport::default();
        for (latest, symbols) in by_latest {
            let start = latest + Duration::days(1);
            if start > today {
                report.current.extend(symbols.into_iter().map(str::to_string));
                continue;
            }
            info!(from = %start, to = %today, symbols = symbols.len(), "updating group");
            for symbol in symbols {
                match self.fetch_into(table, symbol, start, today).await {
                    Fetched::Written(rows) => {
                        report.rows += rows;
                        report.updated.push(symbol.to_string());
                    }
                    Fetched::Empty => report.current.push(symbol.to_string()),
                    Fetched::Failed => report.failed.push(symbol.to_string()),
                }
            }
        }

        info!(
            table,
            updated = report.updated.len(),
            failed = report.failed.len(),
            rows = report.rows,
            "incremental update finished"
        );
        report
    }

    /// Load `symbols` from `start` to today regardless of what is stored.
    pub async fn backfill(&self, table: &str, symbols: &[Symbol], start: Date) -> UpdateReport {
        let today = self.reconciler.config().today();
        let mut report = UpdateReport::default();
        for symbol in symbols {
            match self.fetch_into(table, symbol, start, today).await {
                Fetched::Written(rows) => {
                    report.rows += rows;
                    report.updated.push(symbol.clone());
                }
                Fetched::Empty => report.current.push(symbol.clone()),
                Fetched::Failed => report.failed.push(symbol.clone()),
            }
        }
        report
    }

    /// Incremental update followed by adjustment reconciliation.
    ///
    /// Spans are read once, before any row is appended. The factor check then
    /// compares each symbol's pre-update latest date, whose stored
    /// forward-adjusted history is the one a revision would invalidate.
    ///
    /// # Errors
    ///
    /// Fails only if the table cannot be read.
    pub async fn run(&self, table: &str) -> Result<DailyReport> {
        let spans = self.reconciler.spans(table)?;
        let update = self.update_from_spans(table, &spans).await;
        let refreshed = self.reconciler.reconcile_spans(table, &spans).await;
        Ok(DailyReport { update, refreshed })
    }

    /// Run against the default price table.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub async fn run_prices(&self) -> Result<DailyReport> {
        self.run(catalog::PRICE_TABLE).await
    }

    async fn fetch_into(&self, table: &str, symbol: &str, start: Date, end: Date) -> Fetched {
        let rows = match fetch_price_rows(self.provider.as_ref(), symbol, start, end, &ALL_MODES).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(symbol, error = %err, "bar fetch failed");
                return Fetched::Failed;
            }
        };
        if rows.height() == 0 {
            return Fetched::Empty;
        }
        match self.gateway.upsert(table, &rows, &catalog::PRICE_KEY) {
            UpsertOutcome::Written { rows } => Fetched::Written(rows),
            UpsertOutcome::Skipped => Fetched::Empty,
            UpsertOutcome::Failed(_) => Fetched::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use polars::prelude::*;
    use strata_store::{DuckDbStore, SchemaCatalog};
    use strata_traits::{AdjustmentMode, RelationalStore, frame::column_values};

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    fn config() -> ReconcileConfig {
        ReconcileConfig {
            as_of: Some(d(2024, 1, 5)),
            ..ReconcileConfig::default()
        }
    }

    fn bars(scale: f64) -> DataFrame {
        df! {
            "ts_code" => ["A", "A", "A", "B"],
            "trade_date" => ["20240103", "20240104", "20240105", "20240105"],
            "open" => [10.0 * scale, 10.1 * scale, 10.2 * scale, 5.0 * scale],
            "close" => [10.1 * scale, 10.2 * scale, 10.3 * scale, 5.1 * scale],
            "vol" => [100.0, 110.0, 120.0, 50.0],
            "amount" => [1010.0, 1122.0, 1236.0, 255.0],
            "adj_factor" => [2.0, 2.0, 2.0, 1.0],
        }
        .unwrap()
    }

    fn provider() -> ScriptedProvider {
        ScriptedProvider::new()
            .with_frame("pro_bar", bars(1.0))
            .with_adjusted("pro_bar", AdjustmentMode::Forward, bars(1.0))
            .with_adjusted("pro_bar", AdjustmentMode::Backward, bars(2.0))
            .with_frame(
                "adj_factor",
                df! {
                    "ts_code" => ["A", "A", "A", "B"],
                    "trade_date" => ["20240103", "20240104", "20240105", "20240105"],
                    "adj_factor" => [2.0, 2.0, 2.0, 1.0],
                }
                .unwrap(),
            )
    }

    fn gateway() -> UpsertGateway {
        let store: Arc<dyn RelationalStore> = Arc::new(DuckDbStore::in_memory().unwrap());
        let gateway = UpsertGateway::new(store, SchemaCatalog::default());
        let seed = df! {
            "ts_code" => ["A", "B"],
            "trade_date" => [d(2024, 1, 3), d(2024, 1, 5)],
            "close" => [10.1, 5.1],
            "adj_factor" => [2.0, 1.0],
        }
        .unwrap();
        assert!(gateway.upsert(catalog::PRICE_TABLE, &seed, &catalog::PRICE_KEY).is_ok());
        gateway
    }

    #[tokio::test]
    async fn test_incremental_window() {
        let provider = Arc::new(provider());
        let gateway = gateway();
        let updater = DailyUpdater::new(provider.clone(), gateway.clone(), config());

        let report = updater.update_incremental(catalog::PRICE_TABLE).await.unwrap();
        assert_eq!(report.updated, vec!["A"]);
        assert_eq!(report.current, vec!["B"]);
        assert_eq!(report.rows, 2);

        let calls = provider.calls_to("pro_bar");
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|p| p.start_date == Some(d(2024, 1, 4))));
        assert!(calls.iter().all(|p| p.end_date == Some(d(2024, 1, 5))));

        let stored = gateway
            .store()
            .read("SELECT close, close_qfq, close_hfq, volume FROM stock_daily WHERE ts_code = 'A' ORDER BY trade_date")
            .unwrap();
        assert_eq!(stored.height(), 3);
        let hfq = column_values(&stored, "close_hfq").unwrap();
        assert_eq!(hfq[0], None);
        assert_eq!(hfq[2], Some(10.3 * 2.0));
        assert_eq!(column_values(&stored, "volume").unwrap()[1], Some(110.0));
    }

    #[tokio::test]
    async fn test_run_checks_pre_update_latest_date() {
        let provider = Arc::new(provider());
        let updater = DailyUpdater::new(provider.clone(), gateway(), config());

        let report = updater.run(catalog::PRICE_TABLE).await.unwrap();
        assert_eq!(report.update.updated, vec!["A"]);
        assert!(report.refreshed.is_empty());

        // A is checked on 01-03, the latest date before the update
        let checks = provider.calls_to("adj_factor");
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].symbol.as_deref(), Some("A"));
        assert_eq!(checks[0].trade_date, Some(d(2024, 1, 3)));
        assert_eq!(checks[1].trade_date, Some(d(2024, 1, 5)));
    }

    #[tokio::test]
    async fn test_run_refreshes_history_revised_before_update() {
        // 01-03 was stored with factor 2.0; the provider has since revised it
        let revised = |scale: f64| {
            df! {
                "ts_code" => ["A", "A"],
                "trade_date" => ["20240103", "20240104"],
                "open" => [8.0 * scale, 10.1 * scale],
                "close" => [8.1 * scale, 10.2 * scale],
                "vol" => [100.0, 110.0],
                "amount" => [1010.0, 1122.0],
                "adj_factor" => [2.5, 2.5],
            }
            .unwrap()
        };
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_frame("pro_bar", revised(1.0))
                .with_adjusted("pro_bar", AdjustmentMode::Forward, revised(0.5))
                .with_adjusted("pro_bar", AdjustmentMode::Backward, revised(2.5))
                .with_frame(
                    "adj_factor",
                    df! {
                        "ts_code" => ["A", "A"],
                        "trade_date" => ["20240103", "20240104"],
                        "adj_factor" => [2.5, 2.5],
                    }
                    .unwrap(),
                ),
        );
        let store: Arc<dyn RelationalStore> = Arc::new(DuckDbStore::in_memory().unwrap());
        let gateway = UpsertGateway::new(store, SchemaCatalog::default());
        let seed = df! {
            "ts_code" => ["A"],
            "trade_date" => [d(2024, 1, 3)],
            "close" => [8.1],
            "adj_factor" => [2.0],
            "close_qfq" => [8.1],
        }
        .unwrap();
        assert!(gateway.upsert(catalog::PRICE_TABLE, &seed, &catalog::PRICE_KEY).is_ok());

        let config = ReconcileConfig {
            as_of: Some(d(2024, 1, 4)),
            ..ReconcileConfig::default()
        };
        let updater = DailyUpdater::new(provider.clone(), gateway.clone(), config);
        let report = updater.run(catalog::PRICE_TABLE).await.unwrap();
        assert_eq!(report.update.updated, vec!["A"]);
        assert_eq!(report.refreshed, vec!["A"]);

        // refreshed from the oldest stored date
        let refresh = provider
            .calls_to("pro_bar")
            .into_iter()
            .filter(|p| p.start_date == Some(d(2024, 1, 3)))
            .collect::<Vec<_>>();
        assert_eq!(refresh.len(), 1);
        assert_eq!(refresh[0].adjustment, AdjustmentMode::Forward);

        let stored = gateway
            .store()
            .read("SELECT adj_factor, close_qfq FROM stock_daily WHERE ts_code = 'A' ORDER BY trade_date")
            .unwrap();
        assert_eq!(column_values(&stored, "adj_factor").unwrap(), vec![Some(2.5), Some(2.5)]);
        assert_eq!(
            column_values(&stored, "close_qfq").unwrap(),
            vec![Some(8.1 * 0.5), Some(10.2 * 0.5)]
        );
    }

    #[tokio::test]
    async fn test_backfill_loads_new_symbols() {
        let provider = Arc::new(provider());
        let gateway = gateway();
        let updater = DailyUpdater::new(provider, gateway.clone(), config());

        let report = updater
            .backfill(catalog::PRICE_TABLE, &["B".to_string(), "Z".to_string()], d(2024, 1, 1))
            .await;
        assert_eq!(report.updated, vec!["B"]);
        assert_eq!(report.current, vec!["Z"]);
    }
}
