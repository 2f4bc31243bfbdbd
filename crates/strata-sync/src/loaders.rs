//! Loaders for the reference tables.
//!
//! These fill the wide tables the other jobs read but never write: stock
//! and index attributes, index bars and the Shenwan industry membership
//! used for neutralization. Price history is seeded with
//! [`DailyUpdater::backfill`](crate::DailyUpdater::backfill).

use polars::prelude::*;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use strata_store::{CreatePolicy, UpsertGateway, catalog};
use strata_traits::{
    DataProvider, Date, QueryParams, Result, Symbol,
    frame::{column_dates, column_strings, column_values},
};
use tracing::{info, warn};

/// Listing states requested from `stock_basic`: listed, delisted, paused.
pub const LIST_STATUSES: [&str; 3] = ["L", "D", "P"];

/// Shenwan classification release used for industry membership.
pub const SW_SOURCE: &str = "SW2021";

/// Column layout of a reference table by value type.
#[derive(Debug, Clone, Copy)]
struct Shape {
    text: &'static [&'static str],
    dates: &'static [&'static str],
    numbers: &'static [&'static str],
}

const STOCK_BASIC: Shape = Shape {
    text: &["ts_code", "symbol", "name", "area", "industry", "market", "list_status"],
    dates: &["list_date", "delist_date"],
    numbers: &[],
};

const INDEX_BASIC: Shape = Shape {
    text: &["ts_code", "name", "market", "publisher", "category", "description"],
    dates: &["base_date", "exp_date"],
    numbers: &["base_point"],
};

const INDEX_DAILY: Shape = Shape {
    text: &["ts_code"],
    dates: &["trade_date"],
    numbers: &["open", "high", "low", "close", "pre_close", "change", "pct_chg", "vol", "amount"],
};

const SW_MEMBER: Shape = Shape {
    text: &["ts_code", "name", "l1_code", "l1_name", "l2_code", "l2_name", "l3_code", "l3_name", "is_new"],
    dates: &["in_date", "out_date"],
    numbers: &[],
};

impl Shape {
    fn fields(&self) -> Vec<&'static str> {
        self.text
            .iter()
            .chain(self.dates)
            .chain(self.numbers)
            .copied()
            .collect()
    }

    /// Rebuild `frame` with exactly these columns; absent ones are null.
    fn conform(&self, frame: &DataFrame) -> Result<DataFrame> {
        let height = frame.height();
        let present = |name: &str| frame.column(name).is_ok();
        let mut columns = Vec::with_capacity(self.text.len() + self.dates.len() + self.numbers.len());
        for &name in self.text {
            let values = if present(name) {
                column_strings(frame, name)?
            } else {
                vec![None; height]
            };
            columns.push(Column::new(name.into(), values));
        }
        for &name in self.dates {
            let values: Vec<Option<Date>> = if present(name) {
                column_dates(frame, name)?
            } else {
                vec![None; height]
            };
            columns.push(Column::new(name.into(), values));
        }
        for &name in self.numbers {
            let values = if present(name) {
                column_values(frame, name)?
            } else {
                vec![None; height]
            };
            columns.push(Column::new(name.into(), values));
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Conform and stack every non-empty frame.
    fn stack(&self, frames: &[DataFrame]) -> Result<DataFrame> {
        let mut out: Option<DataFrame> = None;
        for frame in frames.iter().filter(|f| f.height() > 0) {
            let shaped = self.conform(frame)?;
            match out.as_mut() {
                Some(acc) => {
                    acc.vstack_mut(&shaped)?;
                }
                None => out = Some(shaped),
            }
        }
        Ok(out.unwrap_or_default())
    }
}

fn business_map(company: &DataFrame) -> Result<HashMap<String, String>> {
    let codes = column_strings(company, "ts_code")?;
    let business = column_strings(company, "main_business")?;
    Ok(codes
        .into_iter()
        .zip(business)
        .filter_map(|(code, business)| Some((code?, business?)))
        .collect())
}

/// Outcome of a per-code load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Codes that received rows.
    pub loaded: Vec<Symbol>,
    /// Codes the provider had nothing for.
    pub empty: Vec<Symbol>,
    /// Codes whose fetch or write failed.
    pub failed: Vec<Symbol>,
    /// Rows written in total.
    pub rows: usize,
}

/// Fetches reference data and writes it to its catalog table.
#[derive(Debug, Clone)]
pub struct ReferenceLoader {
    provider: Arc<dyn DataProvider>,
    gateway: UpsertGateway,
}

impl ReferenceLoader {
    /// Create a loader.
    pub const fn new(provider: Arc<dyn DataProvider>, gateway: UpsertGateway) -> Self {
        Self { provider, gateway }
    }

    /// Load every listed, delisted and paused stock into `stock_basic_info`.
    ///
    /// Each stock's `main_business` comes from `stock_company`; stocks the
    /// company endpoint does not cover keep a null.
    ///
    /// # Errors
    ///
    /// Fails if a `stock_basic` call or the write fails.
    pub async fn stock_basics(&self) -> Result<usize> {
        let mut frames = Vec::with_capacity(LIST_STATUSES.len());
        for status in LIST_STATUSES {
            let params = QueryParams::default()
                .with_fields(&STOCK_BASIC.fields())
                .with_param("list_status", status);
            let frame = self.provider.query("stock_basic", &params).await?;
            info!(status, rows = frame.height(), "stock_basic fetched");
            frames.push(frame);
        }
        let mut basics = STOCK_BASIC.stack(&frames)?;
        if basics.height() == 0 {
            warn!("stock_basic returned no rows");
            return Ok(0);
        }

        let business = self.main_business().await;
        let codes = column_strings(&basics, "ts_code")?;
        let main: Vec<Option<String>> = codes
            .iter()
            .map(|code| code.as_ref().and_then(|c| business.get(c).cloned()))
            .collect();
        basics.with_column(Column::new("main_business".into(), main))?;

        let rows = self.gateway.try_upsert(
            catalog::BASIC_INFO_TABLE,
            &basics,
            &catalog::BASIC_INFO_KEY,
            &CreatePolicy::CatalogOnly,
        )?;
        info!(rows, "stock basics loaded");
        Ok(rows)
    }

    async fn main_business(&self) -> HashMap<String, String> {
        let params = QueryParams::default().with_fields(&["ts_code", "main_business"]);
        let company = match self.provider.query("stock_company", &params).await {
            Ok(frame) if frame.height() > 0 => frame,
            Ok(_) => return HashMap::new(),
            Err(err) => {
                warn!(error = %err, "stock_company fetch failed, main_business left empty");
                return HashMap::new();
            }
        };
        match business_map(&company) {
            Ok(map) => map,
            Err(err) => {
                warn!(error = %err, "stock_company response unusable");
                HashMap::new()
            }
        }
    }

    /// Load index attributes for `codes` into `index_basic_info`.
    pub async fn index_basics(&self, codes: &[Symbol]) -> LoadReport {
        let mut report = LoadReport::default();
        for code in codes {
            let params = QueryParams::for_symbol(code.as_str())
                .with_fields(&["ts_code", "name", "market", "publisher", "category", "base_date", "base_point", "exp_date", "desc"]);
            let result = match self.provider.query("index_basic", &params).await {
                Ok(mut frame) => {
                    if frame.column("desc").is_ok() {
                        if let Err(err) = frame.rename("desc", "description".into()) {
                            warn!(code, error = %err, "could not rename desc");
                        }
                    }
                    INDEX_BASIC.stack(&[frame])
                }
                Err(err) => Err(err),
            };
            self.record(&mut report, code, result, catalog::INDEX_BASIC_TABLE, &catalog::BASIC_INFO_KEY);
        }
        info!(loaded = report.loaded.len(), failed = report.failed.len(), "index basics loaded");
        report
    }

    /// Load daily index bars for `codes` over `[start, end]` into `index_daily`.
    pub async fn index_daily(&self, codes: &[Symbol], start: Date, end: Date) -> LoadReport {
        let mut report = LoadReport::default();
        for code in codes {
            let params = QueryParams::for_symbol(code.as_str()).with_range(start, end);
            let result = match self.provider.query("index_daily", &params).await {
                Ok(frame) => INDEX_DAILY.stack(&[frame]),
                Err(err) => Err(err),
            };
            self.record(&mut report, code, result, catalog::INDEX_TABLE, &catalog::PRICE_KEY);
        }
        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            rows = report.rows,
            %start,
            %end,
            "index bars loaded"
        );
        report
    }

    fn record(
        &self,
        report: &mut LoadReport,
        code: &str,
        rows: Result<DataFrame>,
        table: &str,
        key: &[&str],
    ) {
        let rows = match rows {
            Ok(rows) if rows.height() == 0 => {
                warn!(code, table, "provider returned no rows");
                report.empty.push(code.to_string());
                return;
            }
            Ok(rows) => rows,
            Err(err) => {
                warn!(code, table, error = %err, "fetch failed");
                report.failed.push(code.to_string());
                return;
            }
        };
        match self.gateway.try_upsert(table, &rows, key, &CreatePolicy::CatalogOnly) {
            Ok(written) => {
                report.rows += written;
                report.loaded.push(code.to_string());
            }
            Err(err) => {
                warn!(code, table, error = %err, "write failed");
                report.failed.push(code.to_string());
            }
        }
    }

    /// Load Shenwan level-1 industries and their members into `sw_category`.
    ///
    /// # Errors
    ///
    /// Fails if the classification cannot be fetched or the write fails;
    /// a failing member query only loses that industry.
    pub async fn sw_category(&self) -> Result<usize> {
        let params = QueryParams::default()
            .with_fields(&["index_code", "industry_name"])
            .with_param("level", "L1")
            .with_param("src", SW_SOURCE);
        let classes = self.provider.query("index_classify", &params).await?;
        if classes.height() == 0 {
            warn!("index_classify returned no industries");
            return Ok(0);
        }

        let mut frames = Vec::new();
        for code in column_strings(&classes, "index_code")?.into_iter().flatten() {
            let params = QueryParams::default().with_param("l1_code", code.as_str());
            match self.provider.query("index_member_all", &params).await {
                Ok(frame) => frames.push(frame),
                Err(err) => warn!(l1_code = %code, error = %err, "industry members fetch failed"),
            }
        }

        let members = SW_MEMBER.stack(&frames)?;
        if members.height() == 0 {
            return Ok(0);
        }
        let keyed = members.column("ts_code")?.as_materialized_series().is_not_null()
            & members.column("l3_code")?.as_materialized_series().is_not_null();
        let members = members.filter(&keyed)?;

        let rows = self.gateway.try_upsert(
            catalog::SW_CATEGORY_TABLE,
            &members,
            &catalog::SW_CATEGORY_KEY,
            &CreatePolicy::CatalogOnly,
        )?;
        info!(rows, industries = classes.height(), "industry membership loaded");
        Ok(rows)
    }

    /// Listed symbols in `stock_basic_info`, sorted.
    ///
    /// # Errors
    ///
    /// Fails if the table cannot be read.
    pub fn listed_symbols(&self) -> Result<Vec<Symbol>> {
        let frame = self.gateway.store().read(&format!(
            "SELECT ts_code FROM {} WHERE list_status = 'L' ORDER BY ts_code",
            catalog::BASIC_INFO_TABLE
        ))?;
        if frame.height() == 0 {
            return Ok(Vec::new());
        }
        Ok(column_strings(&frame, "ts_code")?.into_iter().flatten().collect())
    }
}
