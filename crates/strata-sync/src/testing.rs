//! Scripted in-memory provider for tests.
//!
//! Frames are registered per endpoint (and optionally per adjustment mode);
//! queries filter them by symbol, date window and any extra parameter that
//! names a column, the way the real API does. Every call is recorded so tests
//! can assert on what was fetched.

use async_trait::async_trait;
use polars::prelude::*;
use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};
use strata_traits::{
    AdjustmentMode, DataProvider, EndpointKind, QueryParams, Result, StrataError,
    frame::{column_dates, column_strings},
};

/// A [`DataProvider`] that serves canned frames and records its calls.
#[derive(Debug)]
pub struct ScriptedProvider {
    kinds: HashMap<String, EndpointKind>,
    frames: HashMap<(String, AdjustmentMode), DataFrame>,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, QueryParams)>>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    /// Provider with the standard endpoint registry and no data.
    pub fn new() -> Self {
        let mut kinds = HashMap::new();
        for name in ["stock_basic", "stock_company", "index_basic", "index_member_all"] {
            kinds.insert(name.to_string(), EndpointKind::STATIC);
        }
        kinds.insert("index_classify".to_string(), EndpointKind::Static { key: "index_code" });
        for name in ["income", "balancesheet", "cashflow", "fina_indicator", "stk_holdernumber"] {
            kinds.insert(name.to_string(), EndpointKind::PERIODIC);
        }
        for name in ["daily", "daily_basic", "adj_factor", "moneyflow", "index_daily"] {
            kinds.insert(name.to_string(), EndpointKind::DAILY);
        }
        kinds.insert("pro_bar".to_string(), EndpointKind::BARS);

        Self {
            kinds,
            frames: HashMap::new(),
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Serve `frame` for `endpoint` regardless of adjustment.
    #[must_use]
    pub fn with_frame(self, endpoint: &str, frame: DataFrame) -> Self {
        self.with_adjusted(endpoint, AdjustmentMode::None, frame)
    }

    /// Serve `frame` for `endpoint` under one adjustment mode.
    #[must_use]
    pub fn with_adjusted(mut self, endpoint: &str, mode: AdjustmentMode, frame: DataFrame) -> Self {
        self.frames.insert((endpoint.to_string(), mode), frame);
        self
    }

    /// Make every call to `endpoint` fail.
    #[must_use]
    pub fn failing(mut self, endpoint: &str) -> Self {
        self.failing.insert(endpoint.to_string());
        self
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<(String, QueryParams)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Parameters of the calls made to `endpoint`.
    pub fn calls_to(&self, endpoint: &str) -> Vec<QueryParams> {
        self.calls()
            .into_iter()
            .filter(|(e, _)| e == endpoint)
            .map(|(_, p)| p)
            .collect()
    }

    fn select(&self, kind: EndpointKind, frame: &DataFrame, params: &QueryParams) -> Result<DataFrame> {
        if frame.height() == 0 {
            return Ok(frame.clone());
        }
        let wanted: Option<HashSet<&str>> = params
            .symbol
            .as_deref()
            .map(|s| s.split(',').map(str::trim).collect());
        let symbols = column_strings(frame, kind.key())?;
        let dates = match kind {
            EndpointKind::Static { .. } => vec![None; frame.height()],
            EndpointKind::Periodic { period_field, .. } => column_dates(frame, period_field)?,
            EndpointKind::TimeSeries { date_field, .. } => column_dates(frame, date_field)?,
        };

        let extras = params
            .extra
            .iter()
            .filter(|(name, _)| frame.column(name).is_ok())
            .map(|(name, value)| Ok((value.as_str(), column_strings(frame, name)?)))
            .collect::<Result<Vec<_>>>()?;

        let mask: BooleanChunked = symbols
            .iter()
            .zip(&dates)
            .enumerate()
            .map(|(i, (symbol, date))| {
                let symbol_ok = match (&wanted, symbol) {
                    (None, _) => true,
                    (Some(set), Some(s)) => set.contains(s.as_str()),
                    (Some(_), None) => false,
                };
                let date_ok = match date {
                    None => true,
                    Some(d) => {
                        params.start_date.is_none_or(|s| *d >= s)
                            && params.end_date.is_none_or(|e| *d <= e)
                            && params.trade_date.is_none_or(|t| *d == t)
                    }
                };
                let extra_ok = extras
                    .iter()
                    .all(|(value, column)| column[i].as_deref() == Some(*value));
                symbol_ok && date_ok && extra_ok
            })
            .collect();
        Ok(frame.filter(&mask)?)
    }
}

#[async_trait]
impl DataProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn endpoint_kind(&self, endpoint: &str) -> Option<EndpointKind> {
        self.kinds.get(endpoint).copied()
    }

    async fn query(&self, endpoint: &str, params: &QueryParams) -> Result<DataFrame> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((endpoint.to_string(), params.clone()));
        }
        if self.failing.contains(endpoint) {
            return Err(StrataError::provider(endpoint, "scripted failure"));
        }
        let kind = self
            .endpoint_kind(endpoint)
            .ok_or_else(|| StrataError::UnknownEndpoint(endpoint.to_string()))?;

        let frame = self
            .frames
            .get(&(endpoint.to_string(), params.adjustment))
            .or_else(|| self.frames.get(&(endpoint.to_string(), AdjustmentMode::None)));
        match frame {
            Some(frame) => self.select(kind, frame, params),
            None => Ok(DataFrame::default()),
        }
    }
}
