//! Factor registry for discovering and constructing the built-in factors.

use crate::{
    AmihudIlliquidity, AnnualizedVolatility, Beta, BollingerWidth, BookToPrice, DebtToAssets,
    DividendYield, EarningsToPrice, LogMarketCap, Macd, MaxDrawdown, NetProfitGrowth, Return12M,
    ReturnOnEquity, RevenueGrowth, Rsi14, SalesToPrice, Turnover20D,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use strata_traits::Factor;

/// Factor category classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactorCategory {
    /// Price momentum factors
    Momentum,
    /// Valuation factors
    Value,
    /// Size factors
    Size,
    /// Profitability and balance-sheet strength
    Quality,
    /// Return dispersion and market risk
    Volatility,
    /// Trading activity and price impact
    Liquidity,
    /// Price-pattern indicators
    Technical,
    /// Period-over-period change of fundamentals
    Growth,
}

impl FactorCategory {
    /// Get a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &str {
        match self {
            Self::Momentum => "Price momentum and trend-following factors",
            Self::Value => "Valuation metrics comparing fundamentals to price",
            Self::Size => "Market capitalisation",
            Self::Quality => "Profitability and leverage from financial statements",
            Self::Volatility => "Return volatility, drawdown and beta",
            Self::Liquidity => "Turnover and price impact of trading",
            Self::Technical => "Indicators computed from the price path",
            Self::Growth => "Growth of reported income items",
        }
    }

    /// Lower-case label, as stored in `factor_metadata`.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Momentum => "momentum",
            Self::Value => "value",
            Self::Size => "size",
            Self::Quality => "quality",
            Self::Volatility => "volatility",
            Self::Liquidity => "liquidity",
            Self::Technical => "technical",
            Self::Growth => "growth",
        }
    }

    /// Every category, in listing order.
    pub const ALL: [Self; 8] = [
        Self::Momentum,
        Self::Value,
        Self::Size,
        Self::Quality,
        Self::Volatility,
        Self::Liquidity,
        Self::Technical,
        Self::Growth,
    ];

    /// Parse a lower-case label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

impl fmt::Display for FactorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Metadata about a factor.
#[derive(Debug, Clone, Serialize)]
pub struct FactorInfo {
    /// Unique identifier, also the stored `factor_name`
    pub name: &'static str,

    /// Category classification
    pub category: FactorCategory,

    /// Human-readable description
    pub description: &'static str,

    /// Calendar days of history read before the window start
    pub lookback_days: i64,

    /// Endpoints the factor pulls from
    pub endpoints: &'static [&'static str],
}

/// Get information about all available factors.
#[must_use]
pub fn available_factors() -> Vec<FactorInfo> {
    vec![
        FactorInfo {
            name: "return_12m",
            category: FactorCategory::Momentum,
            description: "250-day return of the forward-adjusted close",
            lookback_days: 430,
            endpoints: &["pro_bar"],
        },
        FactorInfo {
            name: "book_to_price",
            category: FactorCategory::Value,
            description: "1 / pb from daily_basic",
            lookback_days: 0,
            endpoints: &["daily_basic"],
        },
        FactorInfo {
            name: "earnings_to_price",
            category: FactorCategory::Value,
            description: "1 / pe_ttm from daily_basic",
            lookback_days: 0,
            endpoints: &["daily_basic"],
        },
        FactorInfo {
            name: "sales_to_price",
            category: FactorCategory::Value,
            description: "1 / ps_ttm from daily_basic",
            lookback_days: 0,
            endpoints: &["daily_basic"],
        },
        FactorInfo {
            name: "dividend_yield",
            category: FactorCategory::Value,
            description: "dv_ttm from daily_basic",
            lookback_days: 0,
            endpoints: &["daily_basic"],
        },
        FactorInfo {
            name: "log_market_cap",
            category: FactorCategory::Size,
            description: "ln(total_mv) from daily_basic",
            lookback_days: 0,
            endpoints: &["daily_basic"],
        },
        FactorInfo {
            name: "roe",
            category: FactorCategory::Quality,
            description: "n_income / average total_hldr_eqy_inc_min_int",
            lookback_days: 183,
            endpoints: &["income", "balancesheet"],
        },
        FactorInfo {
            name: "debt_to_assets",
            category: FactorCategory::Quality,
            description: "total_liab / total_assets from balancesheet",
            lookback_days: 183,
            endpoints: &["balancesheet"],
        },
        FactorInfo {
            name: "annualized_volatility",
            category: FactorCategory::Volatility,
            description: "30-day std of daily returns times sqrt(250)",
            lookback_days: 60,
            endpoints: &["pro_bar"],
        },
        FactorInfo {
            name: "max_drawdown",
            category: FactorCategory::Volatility,
            description: "Deepest 60-day drawdown from the running peak",
            lookback_days: 180,
            endpoints: &["pro_bar"],
        },
        FactorInfo {
            name: "beta",
            category: FactorCategory::Volatility,
            description: "250-day beta of daily returns against the CSI 300",
            lookback_days: 430,
            endpoints: &["pro_bar", "index_daily"],
        },
        FactorInfo {
            name: "turnover_20d",
            category: FactorCategory::Liquidity,
            description: "20-day mean of turnover_rate from daily_basic",
            lookback_days: 40,
            endpoints: &["daily_basic"],
        },
        FactorInfo {
            name: "amihud_illiquidity",
            category: FactorCategory::Liquidity,
            description: "ln(|pct_chg| / amount * 1e6 + 1) from daily bars",
            lookback_days: 0,
            endpoints: &["daily"],
        },
        FactorInfo {
            name: "macd",
            category: FactorCategory::Technical,
            description: "12-day EMA minus 26-day EMA of the forward-adjusted close",
            lookback_days: 60,
            endpoints: &["pro_bar"],
        },
        FactorInfo {
            name: "bollinger_width",
            category: FactorCategory::Technical,
            description: "Width of the 20-day, 2-sigma Bollinger band over its midline",
            lookback_days: 60,
            endpoints: &["pro_bar"],
        },
        FactorInfo {
            name: "rsi_14",
            category: FactorCategory::Technical,
            description: "14-day RSI of the forward-adjusted close",
            lookback_days: 30,
            endpoints: &["pro_bar"],
        },
        FactorInfo {
            name: "net_profit_growth",
            category: FactorCategory::Growth,
            description: "Period change of n_income over |previous|",
            lookback_days: 92,
            endpoints: &["income"],
        },
        FactorInfo {
            name: "revenue_growth",
            category: FactorCategory::Growth,
            description: "Period change of revenue over |previous|",
            lookback_days: 92,
            endpoints: &["income"],
        },
    ]
}

/// Get factors in one category.
#[must_use]
pub fn factors_by_category(category: FactorCategory) -> Vec<FactorInfo> {
    available_factors()
        .into_iter()
        .filter(|f| f.category == category)
        .collect()
}

/// Look up a factor's metadata by name.
#[must_use]
pub fn factor_info(name: &str) -> Option<FactorInfo> {
    available_factors().into_iter().find(|f| f.name == name)
}

/// Construct a factor with its default configuration.
#[must_use]
pub fn create_factor(name: &str) -> Option<Box<dyn Factor>> {
    match name {
        "return_12m" => Some(Box::new(Return12M::default())),
        "book_to_price" => Some(Box::new(BookToPrice)),
        "earnings_to_price" => Some(Box::new(EarningsToPrice)),
        "sales_to_price" => Some(Box::new(SalesToPrice)),
        "dividend_yield" => Some(Box::new(DividendYield)),
        "log_market_cap" => Some(Box::new(LogMarketCap)),
        "roe" => Some(Box::new(ReturnOnEquity)),
        "debt_to_assets" => Some(Box::new(DebtToAssets)),
        "annualized_volatility" => Some(Box::new(AnnualizedVolatility::default())),
        "max_drawdown" => Some(Box::new(MaxDrawdown::default())),
        "beta" => Some(Box::new(Beta::default())),
        "turnover_20d" => Some(Box::new(Turnover20D::default())),
        "amihud_illiquidity" => Some(Box::new(AmihudIlliquidity)),
        "macd" => Some(Box::new(Macd)),
        "bollinger_width" => Some(Box::new(BollingerWidth::default())),
        "rsi_14" => Some(Box::new(Rsi14)),
        "net_profit_growth" => Some(Box::new(NetProfitGrowth)),
        "revenue_growth" => Some(Box::new(RevenueGrowth)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_entry_constructs() {
        for info in available_factors() {
            let factor = create_factor(info.name).unwrap();
            assert_eq!(factor.name(), info.name);
            assert_eq!(factor.category(), info.category.label());
            assert_eq!(factor.description(), info.description);
            assert_eq!(factor.lookback_days(), info.lookback_days);
            let requests = factor.requests();
            let endpoints: Vec<&str> = requests.iter().map(|r| r.endpoint.as_str()).collect();
            assert_eq!(endpoints, info.endpoints);
        }
    }

    #[test]
    fn test_unique_names() {
        let factors = available_factors();
        let mut names: Vec<&str> = factors.iter().map(|f| f.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), factors.len());
    }

    #[test]
    fn test_lookup() {
        assert!(factor_info("book_to_price").is_some());
        assert!(create_factor("nope").is_none());
        assert_eq!(factors_by_category(FactorCategory::Size).len(), 1);
    }

    #[test]
    fn test_every_category_populated() {
        for category in FactorCategory::ALL {
            assert!(!factors_by_category(category).is_empty(), "{category} has no factors");
            assert_eq!(FactorCategory::from_label(category.label()), Some(category));
        }
        assert_eq!(FactorCategory::from_label("sentiment"), None);
    }
}
