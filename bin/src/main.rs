//! Strata CLI binary.
//!
//! Command-line interface for the strata factor warehouse.

mod cmd;
mod context;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::process;
use strata_traits::{AdjustmentMode, Date, FieldRequest};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Factor data warehouse for A-share research", long_about = None)]
#[command(version)]
struct Cli {
    /// DuckDB file (defaults to STRATA_DB_PATH, then strata.duckdb)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Log filter used when RUST_LOG is unset (e.g. debug, strata_sync=trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for commands that print results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable tables
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the known tables
    InitSchema {
        /// Tables to create (defaults to every known table)
        #[arg(value_delimiter = ',')]
        tables: Vec<String>,
    },

    /// Resolve fields from the store, fetching what is missing
    Fetch {
        /// Provider endpoint (e.g. daily_basic, pro_bar, income)
        endpoint: String,

        /// Fields to return
        #[arg(short, long, value_delimiter = ',', required = true)]
        fields: Vec<String>,

        /// Ticker symbols (e.g. 600000.SH)
        #[arg(short, long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,

        /// Start date (YYYY-MM-DD or YYYYMMDD)
        #[arg(long, value_parser = context::parse_date_arg)]
        start: Date,

        /// End date (defaults to today)
        #[arg(long, value_parser = context::parse_date_arg)]
        end: Option<Date>,

        /// Price adjustment (none, qfq, hfq)
        #[arg(long, default_value = "none")]
        adjust: AdjustmentMode,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Append new bars to the price table and reconcile adjustments
    UpdateDaily {
        /// Price table
        #[arg(long, default_value = "stock_daily")]
        table: String,

        /// Symbols traded within this many days are maintained
        #[arg(long, default_value = "90")]
        active_window_days: i64,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Load full price history from a start date
    Backfill {
        /// Ticker symbols (defaults to every listed stock in stock_basic_info)
        #[arg(short, long, value_delimiter = ',')]
        symbols: Vec<String>,

        /// First date to load
        #[arg(long, value_parser = context::parse_date_arg)]
        start: Date,

        /// Price table
        #[arg(long, default_value = "stock_daily")]
        table: String,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Load listed, delisted and paused stocks into stock_basic_info
    LoadBasics,

    /// Load index attributes and daily index bars
    LoadIndex {
        /// Index codes (defaults to the main benchmarks)
        #[arg(short, long, value_delimiter = ',')]
        codes: Vec<String>,

        /// Start date
        #[arg(long, value_parser = context::parse_date_arg)]
        start: Date,

        /// End date (defaults to today)
        #[arg(long, value_parser = context::parse_date_arg)]
        end: Option<Date>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Load Shenwan industry membership into sw_category
    LoadIndustry,

    /// Melt a wide table into the long table
    SyncNarrow {
        /// Start date
        #[arg(long, value_parser = context::parse_date_arg)]
        start: Date,

        /// End date (defaults to today)
        #[arg(long, value_parser = context::parse_date_arg)]
        end: Option<Date>,

        /// Wide source table
        #[arg(long, default_value = "stock_daily")]
        source: String,

        /// Long target table
        #[arg(long, default_value = "extra_data")]
        target: String,

        /// Rows per write
        #[arg(long, default_value = "50000")]
        chunk_size: usize,
    },

    /// Compute a factor and store it in factor_panel_data
    Factor {
        /// Factor name (see `strata factors`)
        name: String,

        /// Ticker symbols
        #[arg(short, long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,

        /// Start date
        #[arg(long, value_parser = context::parse_date_arg)]
        start: Date,

        /// End date (defaults to today)
        #[arg(long, value_parser = context::parse_date_arg)]
        end: Option<Date>,

        /// Winsorize and standardize each cross-section before storing
        #[arg(long)]
        preprocess: bool,

        /// Also regress out log market cap and industry (implies --preprocess)
        #[arg(long)]
        neutralize: bool,
    },

    /// List available factors
    Factors {
        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,

        /// Show detailed information
        #[arg(short, long)]
        verbose: bool,
    },

    /// IC analysis of a stored factor against next-day returns
    Ic {
        /// Factor name
        factor: String,

        /// Start date
        #[arg(long, value_parser = context::parse_date_arg)]
        start: Option<Date>,

        /// End date
        #[arg(long, value_parser = context::parse_date_arg)]
        end: Option<Date>,

        /// Dates with fewer paired observations are skipped
        #[arg(long, default_value = "3")]
        min_observations: usize,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let db = context::db_path(cli.db);
    match cli.command {
        Commands::InitSchema { tables } => {
            cmd::schema::init_schema(&db, &tables)?;
        }
        Commands::Fetch {
            endpoint,
            fields,
            symbols,
            start,
            end,
            adjust,
            format,
        } => {
            let end = end.unwrap_or_else(context::today);
            let request = FieldRequest::new(endpoint, &fields).with_adjustment(adjust);
            cmd::fetch::fetch(&db, &request, &symbols, start, end, format).await?;
        }
        Commands::UpdateDaily {
            table,
            active_window_days,
            format,
        } => {
            cmd::update::update_daily(&db, &table, active_window_days, format).await?;
        }
        Commands::Backfill {
            symbols,
            start,
            table,
            format,
        } => {
            cmd::load::backfill(&db, &table, symbols, start, format).await?;
        }
        Commands::LoadBasics => {
            cmd::load::load_basics(&db).await?;
        }
        Commands::LoadIndex {
            codes,
            start,
            end,
            format,
        } => {
            let end = end.unwrap_or_else(context::today);
            cmd::load::load_index(&db, codes, start, end, format).await?;
        }
        Commands::LoadIndustry => {
            cmd::load::load_industry(&db).await?;
        }
        Commands::SyncNarrow {
            start,
            end,
            source,
            target,
            chunk_size,
        } => {
            let end = end.unwrap_or_else(context::today);
            cmd::sync::sync_narrow(&db, start, end, source, target, chunk_size)?;
        }
        Commands::Factor {
            name,
            symbols,
            start,
            end,
            preprocess,
            neutralize,
        } => {
            let end = end.unwrap_or_else(context::today);
            let treatment = if neutralize {
                cmd::factor::Treatment::Neutralize
            } else if preprocess {
                cmd::factor::Treatment::Standardize
            } else {
                cmd::factor::Treatment::Raw
            };
            cmd::factor::run_factor(&db, &name, &symbols, start, end, treatment).await?;
        }
        Commands::Factors { category, verbose } => {
            cmd::factors::list_factors(category, verbose);
        }
        Commands::Ic {
            factor,
            start,
            end,
            min_observations,
            format,
        } => {
            cmd::ic::analyze(&db, &factor, start, end, min_observations, format)?;
        }
    }

    Ok(())
}
