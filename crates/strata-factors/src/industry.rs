//! Industry membership used as neutralization exposures.
//!
//! Shenwan level-1 names come from `sw_category`. Stocks missing there fall
//! back to the exchange industry in `stock_basic_info`.

use std::collections::{BTreeMap, BTreeSet};
use strata_store::catalog;
use strata_traits::{
    LongRecord, RelationalStore, Result, Symbol, WideFrame,
    frame::{DATE_COLUMN, SYMBOL_COLUMN, column_dates, column_strings},
};
use tracing::debug;

/// Prefix of the industry dummy columns.
pub const DUMMY_PREFIX: &str = "ind_";

/// Symbol to industry name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndustryClassification {
    by_symbol: BTreeMap<Symbol, String>,
}

impl IndustryClassification {
    /// Build from `(symbol, industry)` pairs; later pairs win.
    pub fn from_pairs<I, S, N>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, N)>,
        S: Into<Symbol>,
        N: Into<String>,
    {
        Self {
            by_symbol: pairs.into_iter().map(|(s, n)| (s.into(), n.into())).collect(),
        }
    }

    /// Load the current industry of each of `symbols`.
    ///
    /// # Errors
    ///
    /// Fails if an existing table cannot be read.
    pub fn load(store: &dyn RelationalStore, symbols: &[Symbol]) -> Result<Self> {
        let wanted: BTreeSet<&str> = symbols.iter().map(String::as_str).collect();
        let mut by_symbol = BTreeMap::new();

        let sources = [
            (
                catalog::BASIC_INFO_TABLE,
                format!("SELECT ts_code, industry AS name FROM {}", catalog::BASIC_INFO_TABLE),
            ),
            (
                catalog::SW_CATEGORY_TABLE,
                format!(
                    "SELECT ts_code, l1_name AS name FROM {} WHERE out_date IS NULL ORDER BY in_date",
                    catalog::SW_CATEGORY_TABLE
                ),
            ),
        ];
        // Shenwan rows are read last so they replace the exchange industry.
        for (table, sql) in sources {
            if !store.table_exists(table)? {
                continue;
            }
            let frame = store.read(&sql)?;
            if frame.height() == 0 {
                continue;
            }
            let codes = column_strings(&frame, "ts_code")?;
            let names = column_strings(&frame, "name")?;
            for (code, name) in codes.into_iter().zip(names) {
                if let (Some(code), Some(name)) = (code, name) {
                    if wanted.contains(code.as_str()) {
                        by_symbol.insert(code, name);
                    }
                }
            }
        }
        debug!(classified = by_symbol.len(), requested = symbols.len(), "industries loaded");
        Ok(Self { by_symbol })
    }

    /// Industry of `symbol`.
    pub fn industry(&self, symbol: &str) -> Option<&str> {
        self.by_symbol.get(symbol).map(String::as_str)
    }

    /// Number of classified symbols.
    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    /// True if no symbol is classified.
    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }

    /// Add one 0/1 dummy column per industry present in `frame`, minus a baseline.
    ///
    /// The alphabetically first industry is the baseline, so the dummies and
    /// the regression intercept stay independent. Rows of unclassified
    /// symbols get no dummies and drop out of neutralization.
    /// Returns the extended frame and the dummy column names.
    ///
    /// # Errors
    ///
    /// Fails if the frame lacks its key columns.
    pub fn with_dummies(&self, frame: &WideFrame) -> Result<(WideFrame, Vec<String>)> {
        if frame.is_empty() {
            return Ok((frame.clone(), Vec::new()));
        }
        let symbols = column_strings(frame.data(), SYMBOL_COLUMN)?;
        let dates = column_dates(frame.data(), DATE_COLUMN)?;

        let present: BTreeSet<&str> = symbols
            .iter()
            .flatten()
            .filter_map(|s| self.industry(s))
            .collect();
        let dummies: Vec<&str> = present.into_iter().skip(1).collect();
        if dummies.is_empty() {
            return Ok((frame.clone(), Vec::new()));
        }
        let columns: Vec<String> = dummies.iter().map(|n| format!("{DUMMY_PREFIX}{n}")).collect();

        let mut records = Vec::with_capacity(symbols.len() * dummies.len());
        for (symbol, date) in symbols.iter().zip(&dates) {
            let (Some(symbol), Some(date)) = (symbol, date) else {
                continue;
            };
            let Some(industry) = self.industry(symbol) else {
                continue;
            };
            for (name, column) in dummies.iter().zip(&columns) {
                let hot = if *name == industry { 1.0 } else { 0.0 };
                records.push(LongRecord::new(symbol.as_str(), *date, column.as_str(), Some(hot)));
            }
        }
        let extended = frame.merge(&WideFrame::from_records(&records)?)?;
        Ok((extended, columns))
    }
}
