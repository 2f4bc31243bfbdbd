//! `init-schema`: create the known tables.

use crate::context;
use anyhow::{Result, bail};
use strata_store::CreatePolicy;

/// Create `tables`, or every catalog table when none are named.
pub(crate) fn init_schema(db: &str, tables: &[String]) -> Result<()> {
    let gateway = context::open_gateway(db)?;
    let catalog = gateway.catalog();

    let targets: Vec<String> = if tables.is_empty() {
        catalog.names().map(str::to_string).collect()
    } else {
        tables.to_vec()
    };
    if let Some(unknown) = targets.iter().find(|t| !catalog.contains(t.as_str())) {
        bail!("no table definition for '{unknown}'");
    }

    for table in &targets {
        let created = gateway.ensure_table(table, &CreatePolicy::CatalogOnly, None, &[])?;
        println!("  {:20} {}", table, if created { "created" } else { "exists" });
    }
    Ok(())
}
