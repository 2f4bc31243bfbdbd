//! `update-daily`: incremental price update followed by reconciliation.

use crate::{OutputFormat, context};
use anyhow::Result;
use strata_sync::{DailyUpdater, ReconcileConfig};

/// Run the daily job against `table`.
pub(crate) async fn update_daily(
    db: &str,
    table: &str,
    active_window_days: i64,
    format: OutputFormat,
) -> Result<()> {
    let gateway = context::open_gateway(db)?;
    let config = ReconcileConfig {
        active_window_days,
        ..ReconcileConfig::default()
    };
    let updater = DailyUpdater::new(context::provider()?, gateway, config);
    let report = updater.run(table).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("Daily update of {table}:");
            println!("  Updated symbols:   {:>8}", report.update.updated.len());
            println!("  Already current:   {:>8}", report.update.current.len());
            println!("  Failed:            {:>8}", report.update.failed.len());
            println!("  Rows written:      {:>8}", report.update.rows);
            println!("  Refreshed (drift): {:>8}", report.refreshed.len());
            if !report.update.failed.is_empty() {
                println!("\nFailed: {}", report.update.failed.join(", "));
            }
            if !report.refreshed.is_empty() {
                println!("Refreshed: {}", report.refreshed.join(", "));
            }
        }
    }
    Ok(())
}
