//! Classification of field requests by endpoint shape.

use std::sync::Arc;
use strata_traits::{AdjustmentMode, DataProvider, Date, EndpointKind, FieldRequest, Result, StrataError, Symbol};
use tracing::warn;

/// A request paired with its endpoint's registered shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRequest {
    /// The caller's request.
    pub request: FieldRequest,
    /// Shape registered by the provider.
    pub kind: EndpointKind,
}

impl ClassifiedRequest {
    /// Column holding the observation date, `None` for static endpoints.
    pub const fn date_column(&self) -> Option<&'static str> {
        match self.kind {
            EndpointKind::Static { .. } => None,
            EndpointKind::Periodic { period_field, .. } => Some(period_field),
            EndpointKind::TimeSeries { date_field, .. } => Some(date_field),
        }
    }

    /// Column holding the symbol.
    pub const fn symbol_column(&self) -> &'static str {
        self.kind.key()
    }
}

/// Requests split into the three fetch strategies.
#[derive(Debug, Clone)]
pub struct NormalizedQuery {
    /// Symbols to fetch.
    pub symbols: Vec<Symbol>,
    /// Inclusive window start.
    pub start: Date,
    /// Inclusive window end.
    pub end: Date,
    /// Undated attributes, fetched once for the whole symbol set.
    pub static_requests: Vec<ClassifiedRequest>,
    /// Report-period data, fetched per symbol.
    pub periodic: Vec<ClassifiedRequest>,
    /// Daily series, fetched per symbol.
    pub time_series: Vec<ClassifiedRequest>,
    /// Requests rejected with a data-integrity warning.
    pub dropped: Vec<FieldRequest>,
}

impl NormalizedQuery {
    /// Returns true when nothing is left to fetch.
    pub fn is_empty(&self) -> bool {
        self.static_requests.is_empty() && self.periodic.is_empty() && self.time_series.is_empty()
    }

    /// Canonical names of every field the kept requests produce.
    pub fn canonical_fields(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for classified in self
            .static_requests
            .iter()
            .chain(&self.periodic)
            .chain(&self.time_series)
        {
            for field in classified.request.canonical_fields() {
                if !out.contains(&field) {
                    out.push(field);
                }
            }
        }
        out
    }

    /// The same plan restricted to `symbols`.
    #[must_use]
    pub fn for_symbols(&self, symbols: Vec<Symbol>) -> Self {
        Self {
            symbols,
            ..self.clone()
        }
    }
}

/// Maps declarative requests onto provider fetch strategies.
///
/// Pure classification: the provider is only asked for endpoint metadata.
#[derive(Debug, Clone)]
pub struct QuerySpecNormalizer {
    provider: Arc<dyn DataProvider>,
}

impl QuerySpecNormalizer {
    /// Create a normalizer that reads endpoint metadata from `provider`.
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        Self { provider }
    }

    /// Registered shape of the request's endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnknownEndpoint`] naming the endpoint.
    pub fn classify(&self, request: &FieldRequest) -> Result<EndpointKind> {
        self.provider
            .endpoint_kind(&request.endpoint)
            .ok_or_else(|| StrataError::UnknownEndpoint(request.endpoint.clone()))
    }

    /// Split `requests` into static, periodic and time-series buckets.
    ///
    /// Periodic requests that omit their period field, and adjusted requests
    /// against endpoints that cannot adjust, are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Fails on the first unknown endpoint.
    pub fn normalize(
        &self,
        requests: &[FieldRequest],
        symbols: &[Symbol],
        start: Date,
        end: Date,
    ) -> Result<NormalizedQuery> {
        let mut query = NormalizedQuery {
            symbols: symbols.to_vec(),
            start,
            end,
            static_requests: Vec::new(),
            periodic: Vec::new(),
            time_series: Vec::new(),
            dropped: Vec::new(),
        };

        for request in requests {
            let kind = self.classify(request)?;
            let adjustable = matches!(kind, EndpointKind::TimeSeries { adjustable: true, .. });
            if request.adjustment != AdjustmentMode::None && !adjustable {
                warn!(
                    endpoint = %request.endpoint,
                    adjustment = %request.adjustment,
                    "DataIntegrityWarning: endpoint does not support adjustment, request dropped"
                );
                query.dropped.push(request.clone());
                continue;
            }

            let classified = ClassifiedRequest {
                request: request.clone(),
                kind,
            };
            match kind {
                EndpointKind::Static { .. } => query.static_requests.push(classified),
                EndpointKind::Periodic { period_field, .. } => {
                    if request.requests(period_field) {
                        query.periodic.push(classified);
                    } else {
                        warn!(
                            endpoint = %request.endpoint,
                            field = period_field,
                            "DataIntegrityWarning: periodic request without its period field, request dropped"
                        );
                        query.dropped.push(request.clone());
                    }
                }
                EndpointKind::TimeSeries { .. } => query.time_series.push(classified),
            }
        }

        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;

    fn normalizer() -> QuerySpecNormalizer {
        QuerySpecNormalizer::new(Arc::new(ScriptedProvider::new()))
    }

    fn window() -> (Date, Date) {
        (
            Date::from_ymd_opt(2024, 1, 1).unwrap(),
            Date::from_ymd_opt(2024, 3, 31).unwrap(),
        )
    }

    #[test]
    fn test_buckets() {
        let (start, end) = window();
        let requests = vec![
            FieldRequest::new("stock_basic", &["name"]),
            FieldRequest::new("income", &["end_date", "revenue"]),
            FieldRequest::new("daily_basic", &["pe", "pb"]),
            FieldRequest::new("pro_bar", &["open", "close"]).with_adjustment(AdjustmentMode::Forward),
        ];
        let q = normalizer()
            .normalize(&requests, &["A".to_string()], start, end)
            .unwrap();
        assert_eq!(q.static_requests.len(), 1);
        assert_eq!(q.periodic.len(), 1);
        assert_eq!(q.time_series.len(), 2);
        assert!(q.dropped.is_empty());
        assert_eq!(
            q.canonical_fields(),
            vec!["name", "revenue", "pe", "pb", "open_qfq", "close_qfq"]
        );
    }

    #[test]
    fn test_periodic_without_end_date_dropped() {
        let (start, end) = window();
        let requests = vec![FieldRequest::new("income", &["revenue"])];
        let q = normalizer()
            .normalize(&requests, &["A".to_string()], start, end)
            .unwrap();
        assert!(q.is_empty());
        assert_eq!(q.dropped.len(), 1);
    }

    #[test]
    fn test_unknown_endpoint_named() {
        let (start, end) = window();
        let err = normalizer()
            .normalize(&[FieldRequest::new("daily_magic", &["x"])], &[], start, end)
            .unwrap_err();
        assert!(matches!(err, StrataError::UnknownEndpoint(ref e) if e == "daily_magic"));
    }

    #[test]
    fn test_adjustment_on_plain_series_dropped() {
        let (start, end) = window();
        let requests =
            vec![FieldRequest::new("daily", &["close"]).with_adjustment(AdjustmentMode::Backward)];
        let q = normalizer().normalize(&requests, &[], start, end).unwrap();
        assert!(q.time_series.is_empty());
        assert_eq!(q.dropped.len(), 1);
    }

    #[test]
    fn test_date_columns() {
        let classified = ClassifiedRequest {
            request: FieldRequest::new("income", &["end_date"]),
            kind: EndpointKind::PERIODIC,
        };
        assert_eq!(classified.date_column(), Some("end_date"));
        assert_eq!(classified.symbol_column(), "ts_code");
    }
}
