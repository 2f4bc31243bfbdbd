//! Known table definitions.
//!
//! Templates are DuckDB DDL with a `{table_name}` placeholder, so one
//! definition can back several physical tables (`use default stock_daily`
//! creates a table with another name but the `stock_daily` layout).

use polars::prelude::{DataFrame, DataType};
use std::collections::BTreeMap;
use strata_traits::{Result, StrataError, store::quote_ident};

/// Canonical long table.
pub const LONG_TABLE: &str = "extra_data";
/// Uniqueness key of the long table.
pub const LONG_KEY: [&str; 3] = ["ts_code", "trade_date", "data_name"];

/// Wide daily price table.
pub const PRICE_TABLE: &str = "stock_daily";
/// Uniqueness key of the price and index tables.
pub const PRICE_KEY: [&str; 2] = ["ts_code", "trade_date"];

/// Daily index bars.
pub const INDEX_TABLE: &str = "index_daily";

/// Static index attributes.
pub const INDEX_BASIC_TABLE: &str = "index_basic_info";

/// Shenwan industry membership, one row per stock and level-3 industry.
pub const SW_CATEGORY_TABLE: &str = "sw_category";
/// Uniqueness key of the industry membership table.
pub const SW_CATEGORY_KEY: [&str; 2] = ["ts_code", "l3_code"];

/// Static stock attributes.
pub const BASIC_INFO_TABLE: &str = "stock_basic_info";
/// Uniqueness key of the stock and index basic info tables.
pub const BASIC_INFO_KEY: [&str; 1] = ["ts_code"];

/// Factor definitions.
pub const FACTOR_METADATA_TABLE: &str = "factor_metadata";
/// Uniqueness key of the factor metadata table.
pub const FACTOR_METADATA_KEY: [&str; 1] = ["factor_name"];

/// Long factor values.
pub const FACTOR_TABLE: &str = "factor_panel_data";
/// Uniqueness key of the factor value table.
pub const FACTOR_KEY: [&str; 3] = ["ts_code", "trade_date", "factor_name"];

const PLACEHOLDER: &str = "{table_name}";
const DIRECTIVE: &str = "use default";

const EXTRA_DATA_DDL: &str = "CREATE TABLE IF NOT EXISTS {table_name} (
    ts_code    VARCHAR NOT NULL,
    trade_date DATE    NOT NULL,
    data_name  VARCHAR NOT NULL,
    data_value DOUBLE,
    PRIMARY KEY (ts_code, trade_date, data_name)
)";

const STOCK_DAILY_DDL: &str = "CREATE TABLE IF NOT EXISTS {table_name} (
    ts_code          VARCHAR NOT NULL,
    trade_date       DATE    NOT NULL,
    open             DOUBLE,
    high             DOUBLE,
    low              DOUBLE,
    close            DOUBLE,
    volume           DOUBLE,
    amount           DOUBLE,
    adj_factor       DOUBLE,
    open_qfq         DOUBLE,
    high_qfq         DOUBLE,
    low_qfq          DOUBLE,
    close_qfq        DOUBLE,
    pre_close_qfq    DOUBLE,
    price_change_qfq DOUBLE,
    open_hfq         DOUBLE,
    high_hfq         DOUBLE,
    low_hfq          DOUBLE,
    close_hfq        DOUBLE,
    pre_close_hfq    DOUBLE,
    price_change_hfq DOUBLE,
    PRIMARY KEY (ts_code, trade_date)
)";

const INDEX_DAILY_DDL: &str = "CREATE TABLE IF NOT EXISTS {table_name} (
    ts_code    VARCHAR NOT NULL,
    trade_date DATE    NOT NULL,
    open       DOUBLE,
    high       DOUBLE,
    low        DOUBLE,
    close      DOUBLE,
    pre_close  DOUBLE,
    change     DOUBLE,
    pct_chg    DOUBLE,
    vol        DOUBLE,
    amount     DOUBLE,
    PRIMARY KEY (ts_code, trade_date)
)";

const STOCK_BASIC_INFO_DDL: &str = "CREATE TABLE IF NOT EXISTS {table_name} (
    ts_code       VARCHAR NOT NULL,
    symbol        VARCHAR,
    name          VARCHAR,
    area          VARCHAR,
    industry      VARCHAR,
    market        VARCHAR,
    list_status   VARCHAR,
    list_date     DATE,
    delist_date   DATE,
    main_business VARCHAR,
    PRIMARY KEY (ts_code)
)";

const INDEX_BASIC_INFO_DDL: &str = "CREATE TABLE IF NOT EXISTS {table_name} (
    ts_code     VARCHAR NOT NULL,
    name        VARCHAR,
    market      VARCHAR,
    publisher   VARCHAR,
    category    VARCHAR,
    base_date   DATE,
    base_point  DOUBLE,
    exp_date    DATE,
    description VARCHAR,
    PRIMARY KEY (ts_code)
)";

const SW_CATEGORY_DDL: &str = "CREATE TABLE IF NOT EXISTS {table_name} (
    ts_code  VARCHAR NOT NULL,
    name     VARCHAR,
    l1_code  VARCHAR,
    l1_name  VARCHAR,
    l2_code  VARCHAR,
    l2_name  VARCHAR,
    l3_code  VARCHAR NOT NULL,
    l3_name  VARCHAR,
    in_date  DATE,
    out_date DATE,
    is_new   VARCHAR,
    PRIMARY KEY (ts_code, l3_code)
)";

const FACTOR_METADATA_DDL: &str = "CREATE TABLE IF NOT EXISTS {table_name} (
    factor_name VARCHAR NOT NULL,
    category    VARCHAR NOT NULL,
    definition  VARCHAR,
    PRIMARY KEY (factor_name)
)";

const FACTOR_PANEL_DDL: &str = "CREATE TABLE IF NOT EXISTS {table_name} (
    ts_code      VARCHAR NOT NULL,
    trade_date   DATE    NOT NULL,
    factor_name  VARCHAR NOT NULL,
    factor_value DOUBLE,
    PRIMARY KEY (ts_code, trade_date, factor_name)
)";

/// Lookup of DDL templates by table name.
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    templates: BTreeMap<String, String>,
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        catalog.register(LONG_TABLE, EXTRA_DATA_DDL);
        catalog.register(PRICE_TABLE, STOCK_DAILY_DDL);
        catalog.register(INDEX_TABLE, INDEX_DAILY_DDL);
        catalog.register(BASIC_INFO_TABLE, STOCK_BASIC_INFO_DDL);
        catalog.register(INDEX_BASIC_TABLE, INDEX_BASIC_INFO_DDL);
        catalog.register(SW_CATEGORY_TABLE, SW_CATEGORY_DDL);
        catalog.register(FACTOR_METADATA_TABLE, FACTOR_METADATA_DDL);
        catalog.register(FACTOR_TABLE, FACTOR_PANEL_DDL);
        catalog
    }
}

impl SchemaCatalog {
    /// A catalog with no templates.
    pub const fn empty() -> Self {
        Self {
            templates: BTreeMap::new(),
        }
    }

    /// Add or replace a template. It may use `{table_name}`.
    pub fn register(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(name.into(), template.into());
    }

    /// Known template names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Returns true if `name` has a template.
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// DDL for `table` from its own template.
    pub fn ddl_for(&self, table: &str) -> Option<String> {
        self.render(table, table)
    }

    /// DDL that creates `table` with the layout of template `template`.
    pub fn render(&self, template: &str, table: &str) -> Option<String> {
        self.templates
            .get(template)
            .map(|t| t.replace(PLACEHOLDER, &quote_ident(table)))
    }

    /// Resolve a `use default <name>` directive for `table`.
    ///
    /// Returns `None` when the directive is malformed or names an unknown
    /// template.
    pub fn resolve_directive(&self, table: &str, directive: &str) -> Option<String> {
        let lowered = directive.trim().to_ascii_lowercase();
        let name: String = lowered
            .strip_prefix(DIRECTIVE)?
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        self.render(&name, table)
    }

    /// Build DDL from the column types of `rows`, keyed on `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::TableCreation`] if `rows` has no columns.
    pub fn infer_ddl(table: &str, rows: &DataFrame, key: &[&str]) -> Result<String> {
        if rows.width() == 0 {
            return Err(StrataError::TableCreation {
                table: table.to_string(),
                reason: "no columns to infer a schema from".to_string(),
            });
        }

        let mut defs: Vec<String> = rows
            .get_columns()
            .iter()
            .map(|col| {
                let name = col.name().as_str();
                let not_null = if key.contains(&name) { " NOT NULL" } else { "" };
                format!("{} {}{not_null}", quote_ident(name), sql_type(col.dtype()))
            })
            .collect();
        if !key.is_empty() {
            let cols: Vec<String> = key.iter().map(|k| quote_ident(k)).collect();
            defs.push(format!("PRIMARY KEY ({})", cols.join(", ")));
        }

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            quote_ident(table),
            defs.join(",\n    ")
        ))
    }
}

fn sql_type(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Boolean => "BOOLEAN",
        DataType::Date => "DATE",
        DataType::String => "VARCHAR",
        dtype if dtype.is_integer() => "BIGINT",
        _ => "DOUBLE",
    }
}
