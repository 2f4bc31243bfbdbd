//! `backfill`, `load-basics`, `load-index` and `load-industry`: seed the
//! tables the incremental jobs build on.

use crate::{OutputFormat, context};
use anyhow::{Result, bail};
use strata_store::catalog;
use strata_sync::{DailyUpdater, LoadReport, ReconcileConfig, ReferenceLoader};
use strata_traits::{Date, Symbol};

/// Benchmarks loaded when `load-index` is given no codes.
pub(crate) const DEFAULT_INDEX_CODES: [&str; 4] = ["000300.SH", "000905.SH", "000852.SH", "000001.SH"];

/// Load full price history for `symbols`, or every listed stock when empty.
pub(crate) async fn backfill(
    db: &str,
    table: &str,
    symbols: Vec<Symbol>,
    start: Date,
    format: OutputFormat,
) -> Result<()> {
    let gateway = context::open_gateway(db)?;
    let provider = context::provider()?;
    let symbols = if symbols.is_empty() {
        ReferenceLoader::new(provider.clone(), gateway.clone()).listed_symbols()?
    } else {
        symbols
    };
    if symbols.is_empty() {
        bail!("no symbols given and {} has no listed stocks, run `strata load-basics` first", catalog::BASIC_INFO_TABLE);
    }

    let updater = DailyUpdater::new(provider, gateway, ReconcileConfig::default());
    let report = updater.backfill(table, &symbols, start).await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("Backfill of {table} from {start}:");
            println!("  Loaded symbols: {:>8}", report.updated.len());
            println!("  No data:        {:>8}", report.current.len());
            println!("  Failed:         {:>8}", report.failed.len());
            println!("  Rows written:   {:>8}", report.rows);
            if !report.failed.is_empty() {
                println!("\nFailed: {}", report.failed.join(", "));
            }
        }
    }
    Ok(())
}

/// Load `stock_basic_info`.
pub(crate) async fn load_basics(db: &str) -> Result<()> {
    let loader = ReferenceLoader::new(context::provider()?, context::open_gateway(db)?);
    let rows = loader.stock_basics().await?;
    println!("Stored {rows} rows in {}", catalog::BASIC_INFO_TABLE);
    Ok(())
}

/// Load index attributes and daily bars for `codes`.
pub(crate) async fn load_index(
    db: &str,
    codes: Vec<Symbol>,
    start: Date,
    end: Date,
    format: OutputFormat,
) -> Result<()> {
    let codes = if codes.is_empty() {
        DEFAULT_INDEX_CODES.iter().map(|c| (*c).to_string()).collect()
    } else {
        codes
    };
    let loader = ReferenceLoader::new(context::provider()?, context::open_gateway(db)?);
    let basics = loader.index_basics(&codes).await;
    let bars = loader.index_daily(&codes, start, end).await;

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "index_basic_info": basics, "index_daily": bars })
        ),
        OutputFormat::Text => {
            print_report(catalog::INDEX_BASIC_TABLE, &basics);
            print_report(catalog::INDEX_TABLE, &bars);
        }
    }
    Ok(())
}

fn print_report(table: &str, report: &LoadReport) {
    println!("{table}:");
    println!("  Loaded:  {:>8}", report.loaded.len());
    println!("  Empty:   {:>8}", report.empty.len());
    println!("  Failed:  {:>8}", report.failed.len());
    println!("  Rows:    {:>8}", report.rows);
    if !report.failed.is_empty() {
        println!("  Failed codes: {}", report.failed.join(", "));
    }
}

/// Load Shenwan level-1 industry membership.
pub(crate) async fn load_industry(db: &str) -> Result<()> {
    let loader = ReferenceLoader::new(context::provider()?, context::open_gateway(db)?);
    let rows = loader.sw_category().await?;
    println!("Stored {rows} rows in {}", catalog::SW_CATEGORY_TABLE);
    Ok(())
}
