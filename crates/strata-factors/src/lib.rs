//! Factor implementations for the strata warehouse.
//!
//! This crate provides concrete factors, their registry, cross-sectional
//! preprocessing, and the runner that computes factors from warehouse data
//! and stores them in `factor_panel_data`:
//! - Momentum: 12-month return on forward-adjusted closes
//! - Value: book, earnings and sales yields, dividend yield
//! - Size: log market capitalisation
//! - Quality: return on equity, debt to assets
//! - Volatility: annualized volatility, max drawdown, beta
//! - Liquidity: 20-day turnover, Amihud illiquidity
//! - Technical: MACD, Bollinger width, RSI
//! - Growth: net profit and revenue growth
//!
//! [`FactorRunner::compute_neutralized`] regresses factor values on size
//! and [`IndustryClassification`] dummies before storing.
//!
//! # Example
//!
//! ```ignore
//! use strata_factors::{FactorRunner, registry::create_factor};
//!
//! let factor = create_factor("book_to_price").ok_or("unknown factor")?;
//! let outcome = runner.run(factor.as_ref(), &symbols, start, end).await?;
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod growth;
pub mod industry;
pub mod liquidity;
pub mod momentum;
pub mod process;
pub mod quality;
pub mod registry;
pub mod rolling;
pub mod runner;
pub mod size;
pub mod technical;
pub mod value;
pub mod volatility;

pub use growth::{NetProfitGrowth, RevenueGrowth};
pub use industry::IndustryClassification;
pub use liquidity::{AmihudIlliquidity, Turnover20D, TurnoverConfig};
pub use momentum::{Return12M, Return12MConfig};
pub use process::{PreprocessConfig, preprocess};
pub use quality::{DebtToAssets, ReturnOnEquity};
pub use registry::{FactorCategory, FactorInfo, available_factors, create_factor};
pub use runner::{FactorRunner, to_long_format};
pub use size::LogMarketCap;
pub use technical::{BollingerConfig, BollingerWidth, Macd, Rsi14};
pub use value::{BookToPrice, DividendYield, EarningsToPrice, SalesToPrice};
pub use volatility::{
    AnnualizedVolatility, Beta, BetaConfig, DrawdownConfig, MaxDrawdown, VolatilityConfig,
};

use strata_traits::{Date, LongRecord, Result, WideFrame};

/// Apply `f` to one input column within `[start, end]`, naming the output `name`.
///
/// `None` from `f` leaves the cell empty.
pub(crate) fn map_field(
    inputs: &WideFrame,
    input: &str,
    name: &str,
    start: Date,
    end: Date,
    f: impl Fn(f64) -> Option<f64>,
) -> Result<WideFrame> {
    if inputs.is_empty() {
        return Ok(WideFrame::empty());
    }
    let mut records = Vec::new();
    for (symbol, series) in inputs.series(input)? {
        for (date, value) in series {
            if date < start || date > end {
                continue;
            }
            if let Some(out) = f(value) {
                records.push(LongRecord::new(symbol.as_str(), date, name, Some(out)));
            }
        }
    }
    WideFrame::from_records(&records)
}
