//! Error types for the Tushare client.

use thiserror::Error;

/// Tushare error code for "too many calls per minute".
pub const RATE_LIMIT_CODE: i64 = 40203;

/// Errors that can occur when using the Tushare API.
#[derive(Debug, Error)]
pub enum TushareError {
    /// Missing API token.
    #[error("TUSHARE_TOKEN environment variable not set")]
    MissingToken,

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("Failed to parse JSON response: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned a non-zero code.
    #[error("Tushare API error {code}: {msg}")]
    Api {
        /// Tushare error code.
        code: i64,
        /// Message returned with the code.
        msg: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Response rows could not be assembled into a frame.
    #[error("Malformed response: {0}")]
    Frame(String),

    /// Environment variable error.
    #[error("Environment error: {0}")]
    Env(#[from] dotenvy::Error),
}

impl From<polars::error::PolarsError> for TushareError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::Frame(err.to_string())
    }
}

impl From<strata_traits::StrataError> for TushareError {
    fn from(err: strata_traits::StrataError) -> Self {
        Self::Frame(err.to_string())
    }
}

impl TushareError {
    /// Classify a non-zero response code.
    pub fn from_code(code: i64, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if code == RATE_LIMIT_CODE {
            Self::RateLimitExceeded(msg)
        } else {
            Self::Api { code, msg }
        }
    }
}
