//! The upstream data provider capability.

use crate::{AdjustmentMode, Date, EndpointKind, Result, Symbol};
use async_trait::async_trait;
use polars::prelude::DataFrame;
use std::collections::BTreeMap;

/// Parameters of a single provider query.
///
/// Every filter is optional; providers ignore the ones an endpoint does not
/// understand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// Restrict to one symbol.
    pub symbol: Option<Symbol>,
    /// Inclusive lower bound on the endpoint's date axis.
    pub start_date: Option<Date>,
    /// Inclusive upper bound on the endpoint's date axis.
    pub end_date: Option<Date>,
    /// Exact trading date.
    pub trade_date: Option<Date>,
    /// Fields to return; empty means the endpoint's default set.
    pub fields: Vec<String>,
    /// Adjustment for adjustable bar endpoints.
    pub adjustment: AdjustmentMode,
    /// Endpoint-specific filters passed through as given (`list_status`, `level`...).
    pub extra: BTreeMap<String, String>,
}

impl QueryParams {
    /// Query for one symbol.
    pub fn for_symbol(symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: Some(symbol.into()),
            ..Self::default()
        }
    }

    /// Restrict to an inclusive date range.
    #[must_use]
    pub const fn with_range(mut self, start: Date, end: Date) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    /// Restrict to one trading date.
    #[must_use]
    pub const fn on(mut self, trade_date: Date) -> Self {
        self.trade_date = Some(trade_date);
        self
    }

    /// Request specific fields.
    #[must_use]
    pub fn with_fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.fields = fields.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    /// Request an adjusted series.
    #[must_use]
    pub const fn with_adjustment(mut self, adjustment: AdjustmentMode) -> Self {
        self.adjustment = adjustment;
        self
    }

    /// Add an endpoint-specific filter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }
}

/// A source of raw tabular market data.
///
/// Implementations return an empty frame when the endpoint has no data for
/// the query; errors are reserved for transport or API failures.
#[async_trait]
pub trait DataProvider: Send + Sync + std::fmt::Debug {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Registered shape of `endpoint`, or `None` if the provider does not know it.
    fn endpoint_kind(&self, endpoint: &str) -> Option<EndpointKind>;

    /// Run one query against `endpoint`.
    async fn query(&self, endpoint: &str, params: &QueryParams) -> Result<DataFrame>;
}
