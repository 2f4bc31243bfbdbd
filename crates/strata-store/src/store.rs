//! Embedded DuckDB implementation of [`RelationalStore`].

use crate::error::StoreError;
use duckdb::{Connection, params, params_from_iter, types::Value};
use polars::prelude::*;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Mutex, MutexGuard},
};
use strata_traits::{RelationalStore, Result, store::quote_ident};
use tracing::debug;

type StoreResult<T> = std::result::Result<T, StoreError>;

/// DuckDB-backed warehouse.
///
/// The connection sits behind a mutex, so concurrent upserts are applied one
/// transaction at a time.
#[derive(Debug)]
pub struct DuckDbStore {
    conn: Mutex<Connection>,
}

impl DuckDbStore {
    /// Open (or create) a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if DuckDB cannot open the file.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if DuckDB fails to initialise.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Lock)
    }

    /// Execute one or more statements that return no rows.
    pub fn execute_batch(&self, sql: &str) -> StoreResult<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    fn read_frame(&self, query: &str) -> StoreResult<DataFrame> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(query)?;
        let mut rows = stmt.query([])?;
        let names: Vec<String> = rows.as_ref().map(|s| s.column_names()).unwrap_or_default();

        let mut values: Vec<Vec<AnyValue<'static>>> = vec![Vec::new(); names.len()];
        while let Some(row) = rows.next()? {
            for (i, column) in values.iter_mut().enumerate() {
                let value: Value = row.get(i)?;
                column.push(to_any_value(value));
            }
        }

        let columns = names
            .iter()
            .zip(values)
            .map(|(name, column)| {
                Series::from_any_values(name.as_str().into(), &column, false).map(Column::from)
            })
            .collect::<PolarsResult<Vec<_>>>()?;
        Ok(DataFrame::new(columns)?)
    }

    fn upsert_rows(&self, table: &str, rows: &DataFrame, key: &[&str]) -> StoreResult<usize> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey(table.to_string()));
        }
        let names: Vec<String> = rows
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect();
        let key_positions = key
            .iter()
            .map(|k| {
                names
                    .iter()
                    .position(|n| n == k)
                    .ok_or_else(|| StoreError::MissingKey {
                        table: table.to_string(),
                        column: (*k).to_string(),
                    })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        // Later rows replace earlier ones with the same key.
        let mut pending: Vec<Vec<Value>> = Vec::with_capacity(rows.height());
        let mut slots: HashMap<Vec<String>, usize> = HashMap::new();
        for i in 0..rows.height() {
            let row = rows
                .get_columns()
                .iter()
                .map(|c| c.get(i).map(to_duck_value))
                .collect::<PolarsResult<Vec<_>>>()?;
            let row_key: Vec<String> = key_positions
                .iter()
                .map(|&j| format!("{:?}", row[j]))
                .collect();
            match slots.get(&row_key) {
                Some(&at) => pending[at] = row,
                None => {
                    slots.insert(row_key, pending.len());
                    pending.push(row);
                }
            }
        }

        let sql = upsert_sql(table, &names, key);
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in &pending {
                stmt.execute(params_from_iter(row))?;
            }
        }
        tx.commit()?;

        debug!(table, rows = pending.len(), "upsert committed");
        Ok(pending.len())
    }

    fn exists(&self, table: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT count(*) FROM information_schema.tables WHERE table_name = ?",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

impl RelationalStore for DuckDbStore {
    fn read(&self, query: &str) -> Result<DataFrame> {
        Ok(self.read_frame(query)?)
    }

    fn upsert(&self, table: &str, rows: &DataFrame, key: &[&str]) -> Result<usize> {
        Ok(self.upsert_rows(table, rows, key)?)
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.exists(table)?)
    }

    fn create_table(&self, ddl: &str) -> Result<()> {
        Ok(self.execute_batch(ddl)?)
    }
}

/// `INSERT … ON CONFLICT (key) DO UPDATE SET col = excluded.col` for every non-key column.
pub(crate) fn upsert_sql(table: &str, columns: &[String], key: &[&str]) -> String {
    let cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let conflict: Vec<String> = key.iter().map(|k| quote_ident(k)).collect();
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !key.contains(&c.as_str()))
        .map(|c| format!("{0} = excluded.{0}", quote_ident(c)))
        .collect();

    let action = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    format!(
        "INSERT INTO {} ({}) VALUES ({placeholders}) ON CONFLICT ({}) {action}",
        quote_ident(table),
        cols.join(", "),
        conflict.join(", "),
    )
}

fn finite_or_null(v: f64) -> Value {
    if v.is_finite() {
        Value::Double(v)
    } else {
        Value::Null
    }
}

fn to_duck_value(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Boolean(b),
        AnyValue::String(s) => Value::Text(s.to_string()),
        AnyValue::StringOwned(s) => Value::Text(s.to_string()),
        AnyValue::Int32(v) => Value::BigInt(v.into()),
        AnyValue::Int64(v) => Value::BigInt(v),
        AnyValue::UInt32(v) => Value::BigInt(v.into()),
        AnyValue::UInt64(v) => i64::try_from(v).map_or(Value::Double(v as f64), Value::BigInt),
        AnyValue::Float32(v) => finite_or_null(v.into()),
        AnyValue::Float64(v) => finite_or_null(v),
        AnyValue::Date(days) => Value::Date32(days),
        other => Value::Text(other.to_string()),
    }
}

fn to_any_value(value: Value) -> AnyValue<'static> {
    match value {
        Value::Null => AnyValue::Null,
        Value::Boolean(b) => AnyValue::Boolean(b),
        Value::TinyInt(v) => AnyValue::Int64(v.into()),
        Value::SmallInt(v) => AnyValue::Int64(v.into()),
        Value::Int(v) => AnyValue::Int64(v.into()),
        Value::BigInt(v) => AnyValue::Int64(v),
        Value::UTinyInt(v) => AnyValue::Int64(v.into()),
        Value::USmallInt(v) => AnyValue::Int64(v.into()),
        Value::UInt(v) => AnyValue::Int64(v.into()),
        Value::UBigInt(v) => i64::try_from(v).map_or(AnyValue::Float64(v as f64), AnyValue::Int64),
        Value::HugeInt(v) => AnyValue::Float64(v as f64),
        Value::Float(v) => AnyValue::Float64(v.into()),
        Value::Double(v) => AnyValue::Float64(v),
        Value::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .map_or(AnyValue::Null, AnyValue::Float64),
        Value::Date32(days) => AnyValue::Date(days),
        Value::Text(s) => AnyValue::StringOwned(s.into()),
        other => AnyValue::StringOwned(format!("{other:?}").into()),
    }
}
