//! Store and provider wiring shared by the subcommands.

use anyhow::{Context as _, Result};
use chrono::Local;
use std::{env, sync::Arc};
use strata_store::{DuckDbStore, SchemaCatalog, UpsertGateway};
use strata_traits::{DataProvider, Date, RelationalStore, frame::parse_date};
use strata_tushare::TushareClient;
use tracing::debug;

/// Database file used when neither `--db` nor `STRATA_DB_PATH` is given.
pub(crate) const DEFAULT_DB_PATH: &str = "strata.duckdb";

/// Resolve the database path from the flag, then the environment.
pub(crate) fn db_path(flag: Option<String>) -> String {
    flag.or_else(|| env::var("STRATA_DB_PATH").ok().filter(|p| !p.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
}

/// Open the store and wrap it in a gateway with the known tables.
pub(crate) fn open_gateway(db: &str) -> Result<UpsertGateway> {
    debug!(path = db, "opening store");
    let store: Arc<dyn RelationalStore> =
        Arc::new(DuckDbStore::open(db).with_context(|| format!("opening database {db}"))?);
    Ok(UpsertGateway::new(store, SchemaCatalog::default()))
}

/// Tushare client from `TUSHARE_TOKEN`.
pub(crate) fn provider() -> Result<Arc<dyn DataProvider>> {
    let client = TushareClient::from_env().context("configuring the Tushare client")?;
    Ok(Arc::new(client))
}

/// Local calendar date.
pub(crate) fn today() -> Date {
    Local::now().date_naive()
}

/// Clap parser for `YYYY-MM-DD` or `YYYYMMDD`.
pub(crate) fn parse_date_arg(s: &str) -> Result<Date, String> {
    parse_date(s).ok_or_else(|| format!("invalid date '{s}', expected YYYY-MM-DD or YYYYMMDD"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_date_arg() {
        let date = parse_date_arg("2024-01-15").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 1, 15));
        assert_eq!(parse_date_arg("20240115").unwrap(), date);
        assert!(parse_date_arg("invalid").is_err());
    }

    #[test]
    fn test_db_path_flag_wins() {
        assert_eq!(db_path(Some("x.duckdb".to_string())), "x.duckdb");
    }
}
