//! Registered Tushare endpoints and their response shapes.

use strata_traits::EndpointKind;

/// Every endpoint the client knows, in registry order.
pub const ENDPOINTS: [&str; 16] = [
    "stock_basic",
    "stock_company",
    "index_basic",
    "index_classify",
    "index_member_all",
    "income",
    "balancesheet",
    "cashflow",
    "fina_indicator",
    "stk_holdernumber",
    "daily",
    "daily_basic",
    "adj_factor",
    "moneyflow",
    "index_daily",
    "pro_bar",
];

/// Response shape of a Tushare endpoint.
pub fn endpoint_kind(endpoint: &str) -> Option<EndpointKind> {
    match endpoint {
        "stock_basic" | "stock_company" | "index_basic" | "index_member_all" => {
            Some(EndpointKind::STATIC)
        }
        "index_classify" => Some(EndpointKind::Static { key: "index_code" }),
        "income" | "balancesheet" | "cashflow" | "fina_indicator" | "stk_holdernumber" => {
            Some(EndpointKind::PERIODIC)
        }
        "daily" | "daily_basic" | "adj_factor" | "moneyflow" | "index_daily" => {
            Some(EndpointKind::DAILY)
        }
        "pro_bar" => Some(EndpointKind::BARS),
        _ => None,
    }
}

/// Fields returned by `daily`, used to build `pro_bar` bars.
pub const DAILY_FIELDS: [&str; 11] = [
    "ts_code",
    "trade_date",
    "open",
    "high",
    "low",
    "close",
    "pre_close",
    "change",
    "pct_chg",
    "vol",
    "amount",
];

/// Prepend the endpoint's key columns to `fields` when they are missing.
///
/// An empty field list is left empty so the API returns its default set.
pub fn with_key_fields(kind: EndpointKind, fields: &[String]) -> Vec<String> {
    if fields.is_empty() {
        return Vec::new();
    }
    let keys: Vec<&str> = match kind {
        EndpointKind::Static { key } => vec![key],
        EndpointKind::Periodic { key, period_field } => vec![key, period_field],
        EndpointKind::TimeSeries {
            key, date_field, ..
        } => vec![key, date_field],
    };
    let mut out: Vec<String> = keys
        .into_iter()
        .filter(|k| !fields.iter().any(|f| f == k))
        .map(str::to_string)
        .collect();
    out.extend(fields.iter().cloned());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_endpoint_registered() {
        for endpoint in ENDPOINTS {
            assert!(endpoint_kind(endpoint).is_some(), "{endpoint}");
        }
        assert!(endpoint_kind("daily_magic").is_none());
    }

    #[test]
    fn test_kinds() {
        assert!(matches!(
            endpoint_kind("income"),
            Some(EndpointKind::Periodic { period_field: "end_date", .. })
        ));
        assert!(matches!(
            endpoint_kind("pro_bar"),
            Some(EndpointKind::TimeSeries { adjustable: true, .. })
        ));
        assert!(matches!(
            endpoint_kind("daily"),
            Some(EndpointKind::TimeSeries { adjustable: false, .. })
        ));
        assert!(matches!(endpoint_kind("stock_basic"), Some(EndpointKind::Static { .. })));
        assert!(matches!(
            endpoint_kind("index_classify"),
            Some(EndpointKind::Static { key: "index_code" })
        ));
    }

    #[test]
    fn test_key_fields_prepended() {
        let fields = vec!["close".to_string(), "trade_date".to_string()];
        let out = with_key_fields(EndpointKind::DAILY, &fields);
        assert_eq!(out, vec!["ts_code", "close", "trade_date"]);
        assert!(with_key_fields(EndpointKind::DAILY, &[]).is_empty());
    }
}
