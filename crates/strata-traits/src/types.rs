//! Common types used throughout the strata warehouse.
//!
//! This module defines the canonical long record, field requests, adjustment
//! modes and the closed set of endpoint kinds a provider can expose.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

// Re-export date type from chrono
pub use chrono::NaiveDate as Date;

/// An instrument identifier such as `600000.SH`.
pub type Symbol = String;

/// Columns that identify a row rather than carry a value.
///
/// They are never melted into long records.
pub const KEY_COLUMNS: [&str; 3] = ["ts_code", "trade_date", "end_date"];

/// Price fields that change name when an adjustment mode is requested.
pub const ADJUSTABLE_FIELDS: [&str; 6] = ["open", "high", "low", "close", "change", "pre_close"];

/// Observation date assigned to static (undated) attributes: `1970-01-01`.
pub fn sentinel_date() -> Date {
    Date::default()
}

/// Corporate-action adjustment applied to a price series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentMode {
    /// Raw prices.
    #[default]
    None,
    /// Forward adjusted (前复权), anchored on the latest factor.
    #[serde(rename = "qfq")]
    Forward,
    /// Backward adjusted (后复权), anchored on the listing factor.
    #[serde(rename = "hfq")]
    Backward,
}

impl AdjustmentMode {
    /// Column suffix used for adjusted fields, if any.
    pub const fn suffix(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Forward => Some("qfq"),
            Self::Backward => Some("hfq"),
        }
    }

    /// Wire name of the mode.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Forward => "qfq",
            Self::Backward => "hfq",
        }
    }
}

impl fmt::Display for AdjustmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdjustmentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "qfq" | "forward" => Ok(Self::Forward),
            "hfq" | "backward" => Ok(Self::Backward),
            other => Err(format!("unknown adjustment mode '{other}'")),
        }
    }
}

/// Returns true if `field` is renamed under an adjustment mode.
pub fn is_adjustable(field: &str) -> bool {
    ADJUSTABLE_FIELDS.contains(&field)
}

/// Name under which `field` is stored for the given adjustment mode.
///
/// Adjustable fields gain a `_qfq`/`_hfq` suffix; `change` becomes
/// `price_change_<suffix>` so it lines up with the wide price table.
///
/// ```
/// use strata_traits::{AdjustmentMode, canonical_field_name};
///
/// assert_eq!(canonical_field_name("close", AdjustmentMode::Forward), "close_qfq");
/// assert_eq!(canonical_field_name("change", AdjustmentMode::Backward), "price_change_hfq");
/// assert_eq!(canonical_field_name("vol", AdjustmentMode::Forward), "vol");
/// ```
pub fn canonical_field_name(field: &str, mode: AdjustmentMode) -> String {
    match mode.suffix() {
        Some(sfx) if is_adjustable(field) => {
            let base = if field == "change" { "price_change" } else { field };
            format!("{base}_{sfx}")
        }
        _ => field.to_string(),
    }
}

/// A declarative request for fields from one provider endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRequest {
    /// Provider endpoint name, e.g. `daily` or `income`.
    pub endpoint: String,
    /// Requested provider field names, key columns included where needed.
    pub fields: Vec<String>,
    /// Adjustment applied to adjustable price fields.
    #[serde(default)]
    pub adjustment: AdjustmentMode,
}

impl FieldRequest {
    /// Build an unadjusted request.
    pub fn new<S: AsRef<str>>(endpoint: impl Into<String>, fields: &[S]) -> Self {
        Self {
            endpoint: endpoint.into(),
            fields: fields.iter().map(|f| f.as_ref().to_string()).collect(),
            adjustment: AdjustmentMode::None,
        }
    }

    /// Set the adjustment mode.
    #[must_use]
    pub const fn with_adjustment(mut self, adjustment: AdjustmentMode) -> Self {
        self.adjustment = adjustment;
        self
    }

    /// Returns true if `field` was requested verbatim.
    pub fn requests(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Canonical names of the value fields this request produces.
    ///
    /// Key columns are excluded, duplicates collapse to the first occurrence.
    pub fn canonical_fields(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            if KEY_COLUMNS.contains(&field.as_str()) {
                continue;
            }
            let name = canonical_field_name(field, self.adjustment);
            if !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }
}

/// Shape of an endpoint's response, registered by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// One row per symbol, no date axis.
    Static {
        /// Symbol column.
        key: &'static str,
    },
    /// One row per symbol per report period.
    Periodic {
        /// Symbol column.
        key: &'static str,
        /// Report period column, `end_date` for tushare statements.
        period_field: &'static str,
    },
    /// One row per symbol per trading date.
    TimeSeries {
        /// Symbol column.
        key: &'static str,
        /// Trading date column.
        date_field: &'static str,
        /// Whether the endpoint accepts an adjustment mode.
        adjustable: bool,
    },
}

impl EndpointKind {
    /// Static endpoint keyed by `ts_code`.
    pub const STATIC: Self = Self::Static { key: "ts_code" };
    /// Periodic endpoint keyed by `(ts_code, end_date)`.
    pub const PERIODIC: Self = Self::Periodic {
        key: "ts_code",
        period_field: "end_date",
    };
    /// Unadjusted time series keyed by `(ts_code, trade_date)`.
    pub const DAILY: Self = Self::TimeSeries {
        key: "ts_code",
        date_field: "trade_date",
        adjustable: false,
    };
    /// Adjustable bar series keyed by `(ts_code, trade_date)`.
    pub const BARS: Self = Self::TimeSeries {
        key: "ts_code",
        date_field: "trade_date",
        adjustable: true,
    };

    /// Symbol column for this endpoint.
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Static { key } | Self::Periodic { key, .. } | Self::TimeSeries { key, .. } => key,
        }
    }

    /// Short label used in logs.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Static { .. } => "static",
            Self::Periodic { .. } => "periodic",
            Self::TimeSeries { .. } => "time-series",
        }
    }
}

/// One canonical observation: `(symbol, date, field) -> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRecord {
    /// Instrument identifier.
    pub symbol: Symbol,
    /// Observation date; the sentinel date for static attributes.
    pub date: Date,
    /// Canonical field name.
    pub field: String,
    /// Value, `None` when the provider reported nothing usable.
    pub value: Option<f64>,
}

impl LongRecord {
    /// Create a record.
    pub fn new(
        symbol: impl Into<Symbol>,
        date: Date,
        field: impl Into<String>,
        value: Option<f64>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            field: field.into(),
            value,
        }
    }

    /// The uniqueness key of the record.
    pub fn key(&self) -> (&str, Date, &str) {
        (self.symbol.as_str(), self.date, self.field.as_str())
    }
}
