//! Idempotent write path.
//!
//! [`UpsertGateway`] wraps a [`RelationalStore`] with the table bootstrap
//! rules: a missing table is created from the [`SchemaCatalog`] or from an
//! explicit policy, never implicitly from the data.

use crate::catalog::SchemaCatalog;
use polars::prelude::*;
use std::sync::Arc;
use strata_traits::{RelationalStore, Result, StrataError};
use tracing::{debug, error, info, warn};

/// How to create the target table when it does not exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CreatePolicy {
    /// Use the catalog template registered under the table's own name.
    #[default]
    CatalogOnly,
    /// `use default <name>` directive, or a bare template name.
    Template(String),
    /// Literal DDL; `{table_name}` is substituted if present.
    Explicit(String),
    /// Infer column types from the rows (opt-in).
    InferFromRows,
}

/// Result of a guarded upsert.
#[derive(Debug)]
pub enum UpsertOutcome {
    /// Nothing to write.
    Skipped,
    /// Rows were written in one transaction.
    Written {
        /// Rows written.
        rows: usize,
    },
    /// The write was abandoned; the store is unchanged.
    Failed(StrataError),
}

impl UpsertOutcome {
    /// Returns true unless the write failed.
    pub const fn is_ok(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    /// Rows written, zero for skipped or failed writes.
    pub const fn rows(&self) -> usize {
        match self {
            Self::Written { rows } => *rows,
            _ => 0,
        }
    }
}

/// Replace NaN and infinities in float columns with nulls.
pub fn normalize_nulls(rows: &DataFrame) -> Result<DataFrame> {
    let mut out = rows.clone();
    for col in rows.get_columns() {
        if !matches!(col.dtype(), DataType::Float32 | DataType::Float64) {
            continue;
        }
        let cleaned: Vec<Option<f64>> = col
            .as_materialized_series()
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v: Option<f64>| v.filter(|x| x.is_finite()))
            .collect();
        out.with_column(Column::new(col.name().clone(), cleaned))?;
    }
    Ok(out)
}

/// Keyed upsert that creates missing tables from the catalog.
#[derive(Debug, Clone)]
pub struct UpsertGateway {
    store: Arc<dyn RelationalStore>,
    catalog: Arc<SchemaCatalog>,
}

impl UpsertGateway {
    /// Create a gateway over `store` using `catalog` for missing tables.
    pub fn new(store: Arc<dyn RelationalStore>, catalog: SchemaCatalog) -> Self {
        Self {
            store,
            catalog: Arc::new(catalog),
        }
    }

    /// The underlying store.
    pub const fn store(&self) -> &Arc<dyn RelationalStore> {
        &self.store
    }

    /// The catalog used for table bootstrap.
    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Make sure `table` exists. Returns true if it had to be created.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::TableCreation`] when no DDL is available under
    /// `policy`, or the store error if creation itself fails.
    pub fn ensure_table(
        &self,
        table: &str,
        policy: &CreatePolicy,
        rows: Option<&DataFrame>,
        key: &[&str],
    ) -> Result<bool> {
        if self.store.table_exists(table)? {
            return Ok(false);
        }

        let ddl = match policy {
            CreatePolicy::CatalogOnly => self.catalog.ddl_for(table),
            CreatePolicy::Template(spec) => self
                .catalog
                .resolve_directive(table, spec)
                .or_else(|| self.catalog.render(spec.trim(), table)),
            CreatePolicy::Explicit(ddl) => Some(ddl.replace("{table_name}", table)),
            CreatePolicy::InferFromRows => match rows {
                Some(rows) => Some(SchemaCatalog::infer_ddl(table, rows, key)?),
                None => None,
            },
        };

        let Some(ddl) = ddl else {
            return Err(StrataError::TableCreation {
                table: table.to_string(),
                reason: format!("no DDL available under {policy:?}"),
            });
        };

        self.store.create_table(&ddl)?;
        info!(table, "created table");
        Ok(true)
    }

    /// Upsert and propagate failures.
    ///
    /// Empty frames are a no-op returning `Ok(0)`.
    pub fn try_upsert(
        &self,
        table: &str,
        rows: &DataFrame,
        key: &[&str],
        policy: &CreatePolicy,
    ) -> Result<usize> {
        if rows.height() == 0 {
            debug!(table, "empty frame, upsert skipped");
            return Ok(0);
        }
        if let Some(missing) = key
            .iter()
            .find(|k| rows.column(k).is_err())
        {
            return Err(StrataError::MissingColumn((*missing).to_string()));
        }

        self.ensure_table(table, policy, Some(rows), key)?;
        let cleaned = normalize_nulls(rows)?;
        self.store.upsert(table, &cleaned, key)
    }

    /// Upsert into a catalog-known table, catching failures at the boundary.
    pub fn upsert(&self, table: &str, rows: &DataFrame, key: &[&str]) -> UpsertOutcome {
        self.upsert_with(table, rows, key, &CreatePolicy::CatalogOnly)
    }

    /// Upsert with an explicit creation policy, catching failures at the boundary.
    pub fn upsert_with(
        &self,
        table: &str,
        rows: &DataFrame,
        key: &[&str],
        policy: &CreatePolicy,
    ) -> UpsertOutcome {
        if rows.height() == 0 {
            warn!(table, "no rows to upsert, skipping");
            return UpsertOutcome::Skipped;
        }
        match self.try_upsert(table, rows, key, policy) {
            Ok(written) => {
                debug!(table, rows = written, "upsert succeeded");
                UpsertOutcome::Written { rows: written }
            }
            Err(err) => {
                error!(table, rows = rows.height(), error = %err, "upsert failed");
                UpsertOutcome::Failed(err)
            }
        }
    }
}
