//! `sync-narrow`: melt a wide table into the long table.

use crate::context;
use anyhow::Result;
use strata_sync::{SyncConfig, WideToLongSync};
use strata_traits::Date;

/// Copy `source` rows in `[start, end]` into `target`.
pub(crate) fn sync_narrow(
    db: &str,
    start: Date,
    end: Date,
    source: String,
    target: String,
    chunk_size: usize,
) -> Result<()> {
    let gateway = context::open_gateway(db)?;
    let config = SyncConfig {
        source_table: source,
        target_table: target,
        chunk_size: chunk_size.max(1),
    };
    let (from, to) = (config.source_table.clone(), config.target_table.clone());
    let report = WideToLongSync::new(gateway, config).sync(start, end)?;

    println!("Synced {from} -> {to} for {start}..{end}:");
    println!("  Source rows:    {:>10}", report.source_rows);
    println!("  Records:        {:>10}", report.written);
    println!("  Failed chunks:  {:>10}", report.failed_chunks);
    Ok(())
}
