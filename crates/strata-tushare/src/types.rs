//! Wire format of the Tushare HTTP API.

use crate::error::TushareError;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request body posted to the API.
#[derive(Debug, Clone, Serialize)]
pub struct ApiRequest<'a> {
    /// Endpoint name.
    pub api_name: &'a str,
    /// Account token.
    pub token: &'a str,
    /// Endpoint parameters (`ts_code`, `start_date`...).
    pub params: Map<String, Value>,
    /// Comma-separated field list; empty for the default set.
    pub fields: String,
}

/// Response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    /// Zero on success.
    pub code: i64,
    /// Error message when `code` is non-zero.
    #[serde(default)]
    pub msg: Option<String>,
    /// Tabular payload.
    #[serde(default)]
    pub data: Option<ApiTable>,
}

/// Column names plus row-major items.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiTable {
    /// Column names.
    pub fields: Vec<String>,
    /// Rows, each aligned with `fields`.
    #[serde(default)]
    pub items: Vec<Vec<Value>>,
}

impl ApiTable {
    /// Convert into a frame.
    ///
    /// A column whose non-null cells are all numbers becomes `f64`; anything
    /// else becomes a string column.
    pub fn into_frame(self) -> Result<DataFrame, TushareError> {
        if let Some(bad) = self.items.iter().find(|row| row.len() != self.fields.len()) {
            return Err(TushareError::Frame(format!(
                "row has {} cells, expected {}",
                bad.len(),
                self.fields.len()
            )));
        }

        let columns = self
            .fields
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let cells = self.items.iter().map(|row| &row[j]);
                let numeric = self
                    .items
                    .iter()
                    .all(|row| row[j].is_null() || row[j].is_number());
                if numeric && !self.items.is_empty() {
                    let values: Vec<Option<f64>> = cells.map(Value::as_f64).collect();
                    Column::new(name.as_str().into(), values)
                } else {
                    let values: Vec<Option<String>> = cells
                        .map(|v| match v {
                            Value::Null => None,
                            Value::String(s) => Some(s.clone()),
                            other => Some(other.to_string()),
                        })
                        .collect();
                    Column::new(name.as_str().into(), values)
                }
            })
            .collect::<Vec<_>>();

        Ok(DataFrame::new(columns)?)
    }
}

/// Decode a raw response body, mapping non-zero codes to errors.
pub fn parse_response(body: &str) -> Result<DataFrame, TushareError> {
    let response: ApiResponse = serde_json::from_str(body)?;
    if response.code != 0 {
        return Err(TushareError::from_code(
            response.code,
            response.msg.unwrap_or_default(),
        ));
    }
    match response.data {
        Some(table) => table.into_frame(),
        None => Ok(DataFrame::default()),
    }
}
