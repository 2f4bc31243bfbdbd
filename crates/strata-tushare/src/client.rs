//! Tushare Pro API client implementation.

use crate::{
    Result,
    bars::adjust_bars,
    endpoints::{DAILY_FIELDS, endpoint_kind, with_key_fields},
    error::TushareError,
    types::{ApiRequest, parse_response},
};
use async_trait::async_trait;
use polars::prelude::DataFrame;
use reqwest::Client;
use serde_json::{Map, Value};
use std::env;
use strata_traits::{
    AdjustmentMode, DataProvider, EndpointKind, QueryParams, StrataError, frame::format_compact,
};
use tracing::{debug, warn};

/// Default Tushare Pro endpoint.
const TUSHARE_API_URL: &str = "http://api.tushare.pro";

/// Tushare Pro API client.
#[derive(Debug, Clone)]
pub struct TushareClient {
    client: Client,
    token: String,
    base_url: String,
}

impl TushareClient {
    /// Create a new client with the given token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            base_url: TUSHARE_API_URL.to_string(),
        }
    }

    /// Point the client at another API host (a proxy or a test server).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Create a client from `TUSHARE_TOKEN` (and optional `TUSHARE_API_URL`).
    ///
    /// This will also load from a `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not set.
    pub fn from_env() -> Result<Self> {
        // Try to load .env file (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let token = env::var("TUSHARE_TOKEN").map_err(|_| TushareError::MissingToken)?;
        if token.trim().is_empty() {
            return Err(TushareError::MissingToken);
        }
        let client = Self::new(token);

        Ok(match env::var("TUSHARE_API_URL") {
            Ok(url) if !url.trim().is_empty() => client.with_base_url(url),
            _ => client,
        })
    }

    /// Call one API and decode the table.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API reports a non-zero code.
    pub async fn call(
        &self,
        api_name: &str,
        params: Map<String, Value>,
        fields: &[String],
    ) -> Result<DataFrame> {
        let request = ApiRequest {
            api_name,
            token: &self.token,
            params,
            fields: fields.join(","),
        };
        debug!(api = api_name, "tushare request");

        let response = self.client.post(&self.base_url).json(&request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(TushareError::Api {
                code: i64::from(status.as_u16()),
                msg: text,
            });
        }

        let text = response.text().await?;
        parse_response(&text)
    }

    /// Raw or adjusted daily bars with their `adj_factor`.
    ///
    /// # Errors
    ///
    /// Returns an error if either underlying call fails.
    pub async fn pro_bar(&self, params: &QueryParams) -> Result<DataFrame> {
        let daily_fields: Vec<String> = DAILY_FIELDS.iter().map(|f| (*f).to_string()).collect();
        let daily = self
            .call("daily", request_params(params), &daily_fields)
            .await?;
        if daily.height() == 0 {
            return Ok(daily);
        }

        let factor_fields = vec![
            "ts_code".to_string(),
            "trade_date".to_string(),
            "adj_factor".to_string(),
        ];
        let factors = self
            .call("adj_factor", request_params(params), &factor_fields)
            .await?;
        if factors.height() == 0 && params.adjustment != AdjustmentMode::None {
            warn!(
                symbol = params.symbol.as_deref().unwrap_or("*"),
                "no adjustment factors, adjusted prices will be null"
            );
        }

        adjust_bars(&daily, &factors, params.adjustment)
    }
}

/// Translate query filters into Tushare parameters.
fn request_params(params: &QueryParams) -> Map<String, Value> {
    let mut map = Map::new();
    if let Some(symbol) = &params.symbol {
        map.insert("ts_code".into(), Value::from(symbol.as_str()));
    }
    if let Some(start) = params.start_date {
        map.insert("start_date".into(), Value::from(format_compact(start)));
    }
    if let Some(end) = params.end_date {
        map.insert("end_date".into(), Value::from(format_compact(end)));
    }
    if let Some(day) = params.trade_date {
        map.insert("trade_date".into(), Value::from(format_compact(day)));
    }
    for (name, value) in &params.extra {
        map.insert(name.clone(), Value::from(value.as_str()));
    }
    map
}

#[async_trait]
impl DataProvider for TushareClient {
    fn name(&self) -> &str {
        "tushare"
    }

    fn endpoint_kind(&self, endpoint: &str) -> Option<EndpointKind> {
        endpoint_kind(endpoint)
    }

    async fn query(&self, endpoint: &str, params: &QueryParams) -> strata_traits::Result<DataFrame> {
        let kind =
            endpoint_kind(endpoint).ok_or_else(|| StrataError::UnknownEndpoint(endpoint.into()))?;

        let result = if endpoint == "pro_bar" {
            self.pro_bar(params).await
        } else {
            let fields = with_key_fields(kind, &params.fields);
            self.call(endpoint, request_params(params), &fields).await
        };
        result.map_err(|e| StrataError::provider(endpoint, e))
    }
}
