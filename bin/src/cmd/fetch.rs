//! `fetch`: resolve fields through the gap-fill pipeline and print them.

use crate::{OutputFormat, context};
use anyhow::Result;
use serde_json::{Map, Value, json};
use strata_sync::GapFillOrchestrator;
use strata_traits::{
    Date, FieldRequest, Symbol, WideFrame,
    frame::{DATE_COLUMN, SYMBOL_COLUMN, column_dates, column_strings, column_values},
};

/// Resolve one request for `symbols` over `[start, end]`.
pub(crate) async fn fetch(
    db: &str,
    request: &FieldRequest,
    symbols: &[Symbol],
    start: Date,
    end: Date,
    format: OutputFormat,
) -> Result<()> {
    let gateway = context::open_gateway(db)?;
    let orchestrator = GapFillOrchestrator::new(context::provider()?, gateway);
    let frame = orchestrator
        .resolve(symbols, std::slice::from_ref(request), start, end)
        .await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&frame_to_json(&frame)?)?),
        OutputFormat::Text => {
            if frame.is_empty() {
                println!("No data for {} over {start}..{end}", request.endpoint);
            } else {
                println!("{}", frame.data());
            }
        }
    }
    Ok(())
}

/// One JSON object per `(symbol, date)` row; missing cells are `null`.
fn frame_to_json(frame: &WideFrame) -> Result<Value> {
    if frame.is_empty() {
        return Ok(json!([]));
    }
    let data = frame.data();
    let symbols = column_strings(data, SYMBOL_COLUMN)?;
    let dates = column_dates(data, DATE_COLUMN)?;
    let fields = frame.fields();
    let columns = fields
        .iter()
        .map(|f| column_values(data, f))
        .collect::<strata_traits::Result<Vec<_>>>()?;

    let rows = (0..frame.len())
        .map(|i| {
            let mut row = Map::new();
            row.insert(SYMBOL_COLUMN.to_string(), json!(symbols[i]));
            row.insert(DATE_COLUMN.to_string(), json!(dates[i].map(|d| d.to_string())));
            for (field, values) in fields.iter().zip(&columns) {
                row.insert(field.clone(), json!(values[i]));
            }
            Value::Object(row)
        })
        .collect();
    Ok(Value::Array(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_traits::LongRecord;

    #[test]
    fn test_frame_to_json_rows() {
        let d = Date::from_ymd_opt(2024, 1, 2).unwrap();
        let frame = WideFrame::from_records(&[
            LongRecord::new("A", d, "pb", Some(2.0)),
            LongRecord::new("B", d, "total_mv", Some(10.0)),
        ])
        .unwrap();
        let value = frame_to_json(&frame).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["ts_code"], "A");
        assert_eq!(rows[0]["trade_date"], "2024-01-02");
        assert_eq!(rows[0]["pb"], 2.0);
        assert!(rows[0]["total_mv"].is_null());
    }
}
