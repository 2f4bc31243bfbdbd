//! Copy of a wide table into the long table.

use crate::long::{LongLayout, records_to_frame};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use strata_store::{UpsertGateway, UpsertOutcome, catalog};
use strata_traits::{
    Date, LongRecord, Result,
    frame::{DATE_COLUMN, SYMBOL_COLUMN, column_dates, column_strings, column_values},
};
use tracing::{info, warn};

/// Wide-to-long sync settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Wide table to read.
    pub source_table: String,
    /// Long table to write.
    pub target_table: String,
    /// Records per upsert.
    pub chunk_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source_table: catalog::PRICE_TABLE.to_string(),
            target_table: catalog::LONG_TABLE.to_string(),
            chunk_size: 50_000,
        }
    }
}

/// Counts from one sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Wide rows read.
    pub source_rows: usize,
    /// Long records written.
    pub written: usize,
    /// Chunks that failed to write.
    pub failed_chunks: usize,
}

/// Melt the numeric non-key columns of `wide`, dropping nulls.
pub fn melt_wide(wide: &DataFrame) -> Result<Vec<LongRecord>> {
    if wide.height() == 0 {
        return Ok(Vec::new());
    }
    let symbols = column_strings(wide, SYMBOL_COLUMN)?;
    let dates = column_dates(wide, DATE_COLUMN)?;

    let mut records = Vec::new();
    for column in wide.get_columns() {
        let name = column.name().as_str();
        let dtype = column.dtype();
        if name == SYMBOL_COLUMN || name == DATE_COLUMN || !(dtype.is_integer() || dtype.is_float()) {
            continue;
        }
        let values = column_values(wide, name)?;
        for ((symbol, date), value) in symbols.iter().zip(&dates).zip(values) {
            if let (Some(symbol), Some(date), Some(value)) = (symbol, date, value) {
                records.push(LongRecord::new(symbol.as_str(), *date, name, Some(value)));
            }
        }
    }
    Ok(records)
}

/// Copies a wide table into the long table over a date range.
#[derive(Debug, Clone)]
pub struct WideToLongSync {
    gateway: UpsertGateway,
    config: SyncConfig,
}

impl WideToLongSync {
    /// Create a sync job.
    pub const fn new(gateway: UpsertGateway, config: SyncConfig) -> Self {
        Self { gateway, config }
    }

    /// Sync rows with `start <= trade_date <= end`.
    ///
    /// # Errors
    ///
    /// Fails if the source table cannot be read; chunk write failures are
    /// logged and counted.
    pub fn sync(&self, start: Date, end: Date) -> Result<SyncReport> {
        let source = self.config.source_table.as_str();
        let target = self.config.target_table.as_str();
        let wide = self.gateway.store().read(&format!(
            "SELECT * FROM {source} WHERE {DATE_COLUMN} BETWEEN DATE '{start}' AND DATE '{end}' \
             ORDER BY {DATE_COLUMN}, {SYMBOL_COLUMN}"
        ))?;
        let records = melt_wide(&wide)?;

        let mut report = SyncReport {
            source_rows: wide.height(),
            ..SyncReport::default()
        };
        if records.is_empty() {
            warn!(table = source, %start, %end, "nothing to sync");
            return Ok(report);
        }

        let key = LongLayout::DATA.key();
        for chunk in records.chunks(self.config.chunk_size.max(1)) {
            let frame = records_to_frame(chunk, LongLayout::DATA)?;
            match self.gateway.upsert(target, &frame, &key) {
                UpsertOutcome::Written { rows } => report.written += rows,
                UpsertOutcome::Skipped => {}
                UpsertOutcome::Failed(_) => report.failed_chunks += 1,
            }
        }

        info!(
            source,
            target,
            rows = report.source_rows,
            written = report.written,
            failed_chunks = report.failed_chunks,
            "wide-to-long sync finished"
        );
        Ok(report)
    }
}

/// Sync the price table into the long table with default settings.
///
/// # Errors
///
/// See [`WideToLongSync::sync`].
pub fn sync_wide_to_long(gateway: &UpsertGateway, start: Date, end: Date) -> Result<SyncReport> {
    WideToLongSync::new(gateway.clone(), SyncConfig::default()).sync(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::long::frame_to_records;
    use std::sync::Arc;
    use strata_store::{DuckDbStore, SchemaCatalog};
    use strata_traits::RelationalStore;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    fn gateway() -> UpsertGateway {
        let store: Arc<dyn RelationalStore> = Arc::new(DuckDbStore::in_memory().unwrap());
        let gateway = UpsertGateway::new(store, SchemaCatalog::default());
        let rows = df! {
            "ts_code" => ["A", "A", "B"],
            "trade_date" => [d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 3)],
            "close" => [Some(10.0), Some(10.5), None],
            "close_qfq" => [Some(5.0), Some(5.25), Some(7.0)],
        }
        .unwrap();
        assert!(gateway.upsert(catalog::PRICE_TABLE, &rows, &catalog::PRICE_KEY).is_ok());
        gateway
    }

    #[test]
    fn test_melt_drops_nulls_and_text() {
        let wide = df! {
            "ts_code" => ["A", "B"],
            "trade_date" => ["20240102", "20240102"],
            "close" => [Some(1.0), None],
            "name" => ["x", "y"],
        }
        .unwrap();
        let records = melt_wide(&wide).unwrap();
        assert_eq!(records, vec![LongRecord::new("A", d(2024, 1, 2), "close", Some(1.0))]);
    }

    #[test]
    fn test_sync_in_chunks() {
        let gateway = gateway();
        let config = SyncConfig {
            chunk_size: 2,
            ..SyncConfig::default()
        };
        let report = WideToLongSync::new(gateway.clone(), config)
            .sync(d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        assert_eq!(report.source_rows, 3);
        assert_eq!(report.failed_chunks, 0);

        let long = gateway
            .store()
            .read("SELECT * FROM extra_data ORDER BY ts_code, trade_date, data_name")
            .unwrap();
        let records = frame_to_records(&long, LongLayout::DATA).unwrap();
        // every non-null cell of the wide table
        assert_eq!(records.len(), 5);
        assert_eq!(report.written, 5);
        assert!(records.contains(&LongRecord::new("B", d(2024, 1, 3), "close_qfq", Some(7.0))));
        assert!(!records.iter().any(|r| r.symbol == "B" && r.field == "close"));
    }

    #[test]
    fn test_sync_respects_range() {
        let gateway = gateway();
        let report = sync_wide_to_long(&gateway, d(2024, 1, 3), d(2024, 1, 3)).unwrap();
        assert_eq!(report.source_rows, 2);
        assert_eq!(report.written, 3);
    }
}
