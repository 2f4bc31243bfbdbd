//! Tushare Pro API client for strata.
//!
//! This crate provides a [`DataProvider`](strata_traits::DataProvider) over
//! the [Tushare Pro](https://tushare.pro/) HTTP API, plus the endpoint
//! registry that tells the pipeline how each response is shaped.
//!
//! # Usage
//!
//! ```rust,ignore
//! use strata_traits::{AdjustmentMode, DataProvider, QueryParams};
//! use strata_tushare::TushareClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = TushareClient::from_env()?;
//!
//!     let params = QueryParams::for_symbol("600000.SH")
//!         .with_range(start, end)
//!         .with_adjustment(AdjustmentMode::Forward);
//!     let bars = client.query("pro_bar", &params).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Environment Variables
//!
//! Set `TUSHARE_TOKEN` in your environment or `.env` file:
//!
//! ```bash
//! TUSHARE_TOKEN=your_token_here
//! ```

pub mod bars;
mod client;
pub mod endpoints;
mod error;
pub mod types;

pub use client::TushareClient;
pub use endpoints::{ENDPOINTS, endpoint_kind};
pub use error::{RATE_LIMIT_CODE, TushareError};

/// Result type for Tushare operations.
pub type Result<T> = std::result::Result<T, TushareError>;
