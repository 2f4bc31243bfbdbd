//! The relational store capability.

use crate::Result;
use polars::prelude::DataFrame;

/// A SQL store with keyed upsert semantics.
///
/// Implementations must make `upsert` atomic per call: either every row of
/// the frame is written or none is.
pub trait RelationalStore: Send + Sync + std::fmt::Debug {
    /// Run a read-only query and return the result as a frame.
    fn read(&self, query: &str) -> Result<DataFrame>;

    /// Insert rows, overwriting every non-key column of rows whose `key`
    /// already exists. Returns the number of rows written.
    fn upsert(&self, table: &str, rows: &DataFrame, key: &[&str]) -> Result<usize>;

    /// Returns true if `table` exists.
    fn table_exists(&self, table: &str) -> Result<bool>;

    /// Execute a `CREATE TABLE` statement.
    fn create_table(&self, ddl: &str) -> Result<()>;
}

/// Quote a string as a SQL literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quote a list of strings as a parenthesised SQL `IN` list.
pub fn quote_list<S: AsRef<str>>(values: &[S]) -> String {
    let items: Vec<String> = values.iter().map(|v| quote_literal(v.as_ref())).collect();
    format!("({})", items.join(", "))
}

/// Quote an identifier (table or column name).
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_literal_escapes() {
        assert_eq!(quote_literal("600000.SH"), "'600000.SH'");
        assert_eq!(quote_literal("o'neil"), "'o''neil'");
    }

    #[test]
    fn test_quote_list() {
        assert_eq!(quote_list(&["A", "B"]), "('A', 'B')");
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("close_qfq"), "\"close_qfq\"");
    }
}
