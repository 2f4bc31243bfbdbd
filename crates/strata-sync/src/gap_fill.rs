//! Store-first resolution of field requests.

use crate::{
    fetcher::OnlineFetcher,
    long::{LongLayout, frame_to_records, records_to_frame},
    normalizer::QuerySpecNormalizer,
    unifier::ResponseUnifier,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, sync::Arc};
use strata_store::{UpsertGateway, catalog};
use strata_traits::{
    DataProvider, Date, FieldRequest, LongRecord, Result, Symbol, WideFrame, sentinel_date,
    store::quote_list,
};
use tracing::{debug, info, warn};

/// Gap-fill settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapFillConfig {
    /// Long table holding canonical records.
    pub long_table: String,
}

impl Default for GapFillConfig {
    fn default() -> Self {
        Self {
            long_table: catalog::LONG_TABLE.to_string(),
        }
    }
}

/// Serves field requests from the long table, fetching only what is missing.
///
/// A symbol counts as present if the table holds at least one row for it
/// within the window; partially stored symbols are not refetched.
#[derive(Debug, Clone)]
pub struct GapFillOrchestrator {
    normalizer: QuerySpecNormalizer,
    fetcher: OnlineFetcher,
    unifier: ResponseUnifier,
    gateway: UpsertGateway,
    config: GapFillConfig,
}

impl GapFillOrchestrator {
    /// Create an orchestrator with the default long table.
    pub fn new(provider: Arc<dyn DataProvider>, gateway: UpsertGateway) -> Self {
        Self::with_config(provider, gateway, GapFillConfig::default())
    }

    /// Create an orchestrator with explicit settings.
    pub fn with_config(
        provider: Arc<dyn DataProvider>,
        gateway: UpsertGateway,
        config: GapFillConfig,
    ) -> Self {
        Self {
            normalizer: QuerySpecNormalizer::new(provider.clone()),
            fetcher: OnlineFetcher::new(provider),
            unifier: ResponseUnifier::new(),
            gateway,
            config,
        }
    }

    /// Settings in use.
    pub const fn config(&self) -> &GapFillConfig {
        &self.config
    }

    /// Resolve `requests` for `symbols` over `[start, end]` into a wide frame.
    ///
    /// Static fields are matched on the sentinel date regardless of the window.
    ///
    /// # Errors
    ///
    /// Only request classification fails; store and provider failures are
    /// logged and degrade to whatever data is available.
    pub async fn resolve(
        &self,
        symbols: &[Symbol],
        requests: &[FieldRequest],
        start: Date,
        end: Date,
    ) -> Result<WideFrame> {
        let query = self.normalizer.normalize(requests, symbols, start, end)?;
        let fields = query.canonical_fields();
        if symbols.is_empty() || query.is_empty() {
            debug!("nothing to resolve");
            return Ok(WideFrame::empty());
        }

        let mut records = self.read_stored(symbols, &fields, start, end);
        // A symbol with any stored row counts as present.
        // The static sentinel row counts too: a symbol whose static fields are
        // stored is not fetched for time-series fields in the same query.
        // TODO: detect per-date gaps so partially stored symbols are refetched.
        let found: BTreeSet<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
        let missing: Vec<Symbol> = symbols
            .iter()
            .filter(|s| !found.contains(s.as_str()))
            .cloned()
            .collect();
        info!(
            found = found.len(),
            missing = missing.len(),
            table = %self.config.long_table,
            "store lookup finished"
        );

        if !missing.is_empty() {
            let raw = self.fetcher.fetch(&query.for_symbols(missing)).await;
            let fetched = self.unifier.unify(&raw);
            if fetched.is_empty() {
                warn!("online fetch returned no data, serving stored rows only");
            } else {
                self.persist(&fetched);
                records.extend(fetched);
            }
        }

        WideFrame::from_records(&records)
    }

    fn persist(&self, records: &[LongRecord]) {
        let table = self.config.long_table.as_str();
        match records_to_frame(records, LongLayout::DATA) {
            Ok(frame) => {
                let outcome = self
                    .gateway
                    .upsert(table, &frame, &LongLayout::DATA.key());
                debug!(table, rows = outcome.rows(), "fetched records persisted");
            }
            Err(err) => warn!(table, rows = records.len(), error = %err, "could not build rows to persist"),
        }
    }

    fn read_stored(&self, symbols: &[Symbol], fields: &[String], start: Date, end: Date) -> Vec<LongRecord> {
        let layout = LongLayout::DATA;
        let table = self.config.long_table.as_str();
        let sql = format!(
            "SELECT ts_code, trade_date, {name}, {value} FROM {table} \
             WHERE ts_code IN ({symbols}) AND {name} IN ({fields}) \
             AND (trade_date BETWEEN DATE '{start}' AND DATE '{end}' OR trade_date = DATE '{sentinel}')",
            name = layout.name_column,
            value = layout.value_column,
            symbols = quote_list(symbols),
            fields = quote_list(fields),
            sentinel = sentinel_date(),
        );

        let stored = self
            .gateway
            .store()
            .read(&sql)
            .and_then(|frame| frame_to_records(&frame, layout));
        match stored {
            Ok(records) => records,
            Err(err) => {
                warn!(table, error = %err, "store read failed, treating as empty");
                Vec::new()
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

    fn daily() -> DataFrame {
        df! {
            "ts_code" => ["A", "A", "B", "B", "C", "C"],
            "trade_date" => ["20240102", "20240103", "20240102", "20240103", "20240102", "20240103"],
            "close" => [10.0, 10.5, 20.0, 20.5, 30.0, 30.5],
        }
        .unwrap()
    }

    fn gateway() -> UpsertGateway {
        let store: Arc<dyn RelationalStore> = Arc::new(DuckDbStore::in_memory().unwrap());
        UpsertGateway::new(store, SchemaCatalog::default())
    }

    fn seed(gateway: &UpsertGateway, symbols: &[&str]) {
        let mut records = Vec::new();
        for (i, symbol) in symbols.iter().enumerate() {
            records.push(LongRecord::new(*symbol, d(2024, 1, 2), "close", Some(i as f64)));
            records.push(LongRecord::new(*symbol, d(2024, 1, 3), "close", Some(i as f64 + 0.5)));
        }
        let frame = records_to_frame(&records, LongLayout::DATA).unwrap();
        assert!(gateway.upsert(catalog::LONG_TABLE, &frame, &catalog::LONG_KEY).is_ok());
    }

    fn symbols(names: &[&str]) -> Vec<Symbol> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_fetches_only_missing_symbols() {
        let gateway = gateway();
        seed(&gateway, &["A", "B"]);
        let provider = Arc::new(ScriptedProvider::new().with_frame("daily", daily()));
        let orchestrator = GapFillOrchestrator::new(provider.clone(), gateway);

        let requests = [FieldRequest::new("daily", &["close"])];
        let wide = orchestrator
            .resolve(&symbols(&["A", "B", "C"]), &requests, d(2024, 1, 1), d(2024, 1, 31))
            .await
            .unwrap();

        let calls = provider.calls_to("daily");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].symbol.as_deref(), Some("C"));

        let held: Vec<Symbol> = wide.symbols().unwrap().into_iter().collect();
        assert_eq!(held, symbols(&["A", "B", "C"]));
        // stored values are served as stored
        assert_eq!(wide.value("A", d(2024, 1, 2), "close"), Some(0.0));
        assert_eq!(wide.value("C", d(2024, 1, 3), "close"), Some(30.5));
    }

    #[tokio::test]
    async fn test_fetched_rows_are_persisted() {
        let provider = Arc::new(ScriptedProvider::new().with_frame("daily", daily()));
        let orchestrator = GapFillOrchestrator::new(provider.clone(), gateway());
        let requests = [FieldRequest::new("daily", &["close"])];
        let wanted = symbols(&["A", "C"]);

        let first = orchestrator
            .resolve(&wanted, &requests, d(2024, 1, 1), d(2024, 1, 31))
            .await
            .unwrap();
        let second = orchestrator
            .resolve(&wanted, &requests, d(2024, 1, 1), d(2024, 1, 31))
            .await
            .unwrap();

        assert_eq!(provider.calls_to("daily").len(), 2);
        assert_eq!(first.len(), 4);
        assert_eq!(second.len(), 4);
        assert_eq!(second.value("C", d(2024, 1, 2), "close"), Some(30.0));
    }

    #[tokio::test]
    async fn test_unreadable_store_degrades_to_fetch() {
        let provider = Arc::new(ScriptedProvider::new().with_frame("daily", daily()));
        let config = GapFillConfig {
            long_table: "no_such_table".to_string(),
        };
        let orchestrator = GapFillOrchestrator::with_config(provider.clone(), gateway(), config);

        let wide = orchestrator
            .resolve(
                &symbols(&["B"]),
                &[FieldRequest::new("daily", &["close"])],
                d(2024, 1, 1),
                d(2024, 1, 31),
            )
            .await
            .unwrap();
        assert_eq!(wide.len(), 2);
        assert_eq!(wide.value("B", d(2024, 1, 3), "close"), Some(20.5));
    }

    #[tokio::test]
    async fn test_failed_fetch_returns_stored() {
        let gateway = gateway();
        seed(&gateway, &["A"]);
        let provider = Arc::new(ScriptedProvider::new().failing("daily"));
        let orchestrator = GapFillOrchestrator::new(provider, gateway);

        let wide = orchestrator
            .resolve(
                &symbols(&["A", "Z"]),
                &[FieldRequest::new("daily", &["close"])],
                d(2024, 1, 1),
                d(2024, 1, 31),
            )
            .await
            .unwrap();
        assert_eq!(wide.symbols().unwrap().len(), 1);
        assert_eq!(wide.len(), 2);
    }

    #[tokio::test]
    async fn test_static_fields_use_sentinel() {
        let provider = Arc::new(ScriptedProvider::new().with_frame(
            "stock_company",
            df! { "ts_code" => ["A", "B"], "reg_capital" => [1.0e8, 2.0e8] }.unwrap(),
        ));
        let orchestrator = GapFillOrchestrator::new(provider.clone(), gateway());
        let requests = [FieldRequest::new("stock_company", &["reg_capital"])];

        let wide = orchestrator
            .resolve(&symbols(&["B"]), &requests, d(2024, 1, 1), d(2024, 1, 31))
            .await
            .unwrap();
        assert_eq!(wide.value("B", sentinel_date(), "reg_capital"), Some(2.0e8));
        assert_eq!(wide.value("A", sentinel_date(), "reg_capital"), None);

        // served from the store outside the window as well
        orchestrator
            .resolve(&symbols(&["B"]), &requests, d(2023, 6, 1), d(2023, 6, 30))
            .await
            .unwrap();
        assert_eq!(provider.calls_to("stock_company").len(), 1);
    }

    #[tokio::test]
    async fn test_stored_static_row_marks_symbol_present() {
        let gateway = gateway();
        let stored = [LongRecord::new("B", sentinel_date(), "reg_capital", Some(2.0e8))];
        let frame = records_to_frame(&stored, LongLayout::DATA).unwrap();
        assert!(gateway.upsert(catalog::LONG_TABLE, &frame, &catalog::LONG_KEY).is_ok());

        let provider = Arc::new(ScriptedProvider::new().with_frame("daily", daily()));
        let orchestrator = GapFillOrchestrator::new(provider.clone(), gateway);
        let requests = [
            FieldRequest::new("stock_company", &["reg_capital"]),
            FieldRequest::new("daily", &["close"]),
        ];
        let wide = orchestrator
            .resolve(&symbols(&["B"]), &requests, d(2024, 1, 1), d(2024, 1, 31))
            .await
            .unwrap();

        assert!(provider.calls().is_empty());
        assert_eq!(wide.value("B", sentinel_date(), "reg_capital"), Some(2.0e8));
        assert_eq!(wide.value("B", d(2024, 1, 2), "close"), None);
    }

    #[tokio::test]
    async fn test_unknown_endpoint_fails() {
        let orchestrator = GapFillOrchestrator::new(Arc::new(ScriptedProvider::new()), gateway());
        let result = orchestrator
            .resolve(
                &symbols(&["A"]),
                &[FieldRequest::new("nope", &["x"])],
                d(2024, 1, 1),
                d(2024, 1, 31),
            )
            .await;
        assert!(result.is_err());
    }
}
