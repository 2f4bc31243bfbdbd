//! Online fetching of a normalized query.

use crate::{
    normalizer::{ClassifiedRequest, NormalizedQuery},
    unifier::RawResponses,
};
use polars::prelude::DataFrame;
use std::sync::Arc;
use strata_traits::{DataProvider, QueryParams, Result};
use tracing::{debug, warn};

/// Fields to ask the provider for, with the key columns added.
fn wire_fields(classified: &ClassifiedRequest) -> Vec<String> {
    let requested = &classified.request.fields;
    if requested.is_empty() {
        return Vec::new();
    }
    let mut fields: Vec<String> = std::iter::once(classified.symbol_column())
        .chain(classified.date_column())
        .filter(|k| !requested.iter().any(|f| f == k))
        .map(str::to_string)
        .collect();
    fields.extend(requested.iter().cloned());
    fields
}

/// Runs the provider calls a [`NormalizedQuery`] describes.
///
/// Static endpoints are called once for the whole symbol set, periodic and
/// time-series endpoints once per symbol. A failed call is logged and skipped.
#[derive(Debug, Clone)]
pub struct OnlineFetcher {
    provider: Arc<dyn DataProvider>,
}

impl OnlineFetcher {
    /// Create a fetcher over `provider`.
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        Self { provider }
    }

    /// Fetch every request in `query`.
    pub async fn fetch(&self, query: &NormalizedQuery) -> RawResponses {
        let mut raw = RawResponses {
            symbols: query.symbols.clone(),
            ..RawResponses::default()
        };

        for classified in &query.static_requests {
            let params = QueryParams::default().with_fields(&wire_fields(classified));
            if let Some(frame) = self.call(classified, &params, None).await {
                raw.static_frames.push((classified.clone(), frame));
            }
        }

        for symbol in &query.symbols {
            for classified in &query.periodic {
                let params = QueryParams::for_symbol(symbol.as_str())
                    .with_range(query.start, query.end)
                    .with_fields(&wire_fields(classified));
                if let Some(frame) = self.call(classified, &params, Some(symbol.as_str())).await {
                    raw.periodic
                        .entry(symbol.clone())
                        .or_default()
                        .push((classified.clone(), frame));
                }
            }

            for classified in &query.time_series {
                let params = QueryParams::for_symbol(symbol.as_str())
                    .with_range(query.start, query.end)
                    .with_fields(&wire_fields(classified))
                    .with_adjustment(classified.request.adjustment);
                if let Some(frame) = self.call(classified, &params, Some(symbol.as_str())).await {
                    raw.time_series
                        .entry(symbol.clone())
                        .or_default()
                        .push((classified.clone(), frame));
                }
            }
        }

        debug!(
            provider = self.provider.name(),
            frames = raw.len(),
            symbols = query.symbols.len(),
            "online fetch finished"
        );
        raw
    }

    async fn call(
        &self,
        classified: &ClassifiedRequest,
        params: &QueryParams,
        symbol: Option<&str>,
    ) -> Option<DataFrame> {
        let endpoint = classified.request.endpoint.as_str();
        let result: Result<DataFrame> = self.provider.query(endpoint, params).await;
        match result {
            Ok(frame) => Some(frame),
            Err(err) => {
                warn!(
                    endpoint,
                    symbol = symbol.unwrap_or("*"),
                    error = %err,
                    "provider call failed, unit skipped"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{normalizer::QuerySpecNormalizer, testing::ScriptedProvider};
    use polars::prelude::*;
    use strata_traits::{AdjustmentMode, Date, EndpointKind, FieldRequest};

    fn window() -> (Date, Date) {
        (
            Date::from_ymd_opt(2024, 1, 1).unwrap(),
            Date::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    #[test]
    fn test_wire_fields_add_keys() {
        let classified = ClassifiedRequest {
            request: FieldRequest::new("daily", &["close"]),
            kind: EndpointKind::DAILY,
        };
        assert_eq!(wire_fields(&classified), vec!["ts_code", "trade_date", "close"]);

        let classified = ClassifiedRequest {
            request: FieldRequest::new("income", &["end_date", "revenue"]),
            kind: EndpointKind::PERIODIC,
        };
        assert_eq!(wire_fields(&classified), vec!["ts_code", "end_date", "revenue"]);
    }

    #[tokio::test]
    async fn test_call_pattern() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_frame(
                    "stock_basic",
                    df! { "ts_code" => ["A", "B"], "name" => ["Alpha", "Beta"] }.unwrap(),
                )
                .failing("daily_basic"),
        );
        let (start, end) = window();
        let requests = vec![
            FieldRequest::new("stock_basic", &["name"]),
            FieldRequest::new("daily_basic", &["pe"]),
            FieldRequest::new("pro_bar", &["close"]).with_adjustment(AdjustmentMode::Forward),
        ];
        let symbols = vec!["A".to_string(), "B".to_string()];
        let query = QuerySpecNormalizer::new(provider.clone())
            .normalize(&requests, &symbols, start, end)
            .unwrap();
        let raw = OnlineFetcher::new(provider.clone()).fetch(&query).await;

        assert_eq!(provider.calls_to("stock_basic").len(), 1);
        assert_eq!(provider.calls_to("stock_basic")[0].symbol, None);
        assert_eq!(provider.calls_to("daily_basic").len(), 2);

        let bars = provider.calls_to("pro_bar");
        assert_eq!(bars.len(), 2);
        assert!(bars.iter().all(|p| p.adjustment == AdjustmentMode::Forward));
        assert_eq!(bars[0].start_date, Some(start));

        // failing endpoint contributes nothing, the rest survives
        assert_eq!(raw.static_frames.len(), 1);
        assert_eq!(raw.time_series["A"].len(), 1);
        assert_eq!(raw.time_series["A"][0].0.request.endpoint, "pro_bar");
    }
}
