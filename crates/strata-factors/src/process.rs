//! Cross-sectional preprocessing of raw factor values.
//!
//! Per date: MAD winsorization, z-score, optional OLS neutralization against
//! exposure columns, then a second z-score on the residuals.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strata_traits::{
    Date, LongRecord, Result, WideFrame,
    frame::{DATE_COLUMN, SYMBOL_COLUMN, column_dates, column_strings, column_values},
    stats::{DEFAULT_MAD_DEVIATIONS, neutralize, standardize, winsorize_mad},
};
use tracing::debug;

/// Preprocessing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Scaled MADs kept around the median.
    pub n_dev: f64,
    /// Exposure columns to neutralize against; empty skips neutralization.
    pub exposures: Vec<String>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            n_dev: DEFAULT_MAD_DEVIATIONS,
            exposures: Vec::new(),
        }
    }
}

/// Winsorize, standardize and optionally neutralize one cross-section.
///
/// Missing values are NaN on input and output. Rows missing an exposure come
/// back as NaN. A singular exposure matrix falls back to the standardized values.
pub fn process_cross_section(values: &[f64], exposures: &[Vec<f64>], n_dev: f64) -> Vec<f64> {
    let clipped = winsorize_mad(values, n_dev);
    let (scored, _) = standardize(&clipped);
    if exposures.is_empty() {
        return scored;
    }
    match neutralize(&scored, exposures) {
        Ok(residuals) => standardize(&residuals).0,
        Err(err) => {
            debug!(error = %err, "neutralization skipped");
            scored
        }
    }
}

/// Preprocess `field` of `frame` date by date.
///
/// Returns a frame holding only `field`, with missing results dropped.
///
/// # Errors
///
/// Returns [`StrataError::MissingColumn`](strata_traits::StrataError::MissingColumn)
/// if `field` or an exposure column is absent.
pub fn preprocess(frame: &WideFrame, field: &str, config: &PreprocessConfig) -> Result<WideFrame> {
    if frame.is_empty() {
        return Ok(WideFrame::empty());
    }
    let data = frame.data();
    let symbols = column_strings(data, SYMBOL_COLUMN)?;
    let dates = column_dates(data, DATE_COLUMN)?;
    let values = column_values(data, field)?;
    let exposures = config
        .exposures
        .iter()
        .map(|name| column_values(data, name))
        .collect::<Result<Vec<_>>>()?;

    let mut by_date: BTreeMap<Date, Vec<usize>> = BTreeMap::new();
    for (i, date) in dates.iter().enumerate() {
        if let (Some(date), Some(_)) = (date, &symbols[i]) {
            by_date.entry(*date).or_default().push(i);
        }
    }

    let mut records = Vec::new();
    for (date, rows) in by_date {
        let section: Vec<f64> = rows.iter().map(|&i| values[i].unwrap_or(f64::NAN)).collect();
        let section_exposures: Vec<Vec<f64>> = exposures
            .iter()
            .map(|col| rows.iter().map(|&i| col[i].unwrap_or(f64::NAN)).collect())
            .collect();

        let processed = process_cross_section(&section, &section_exposures, config.n_dev);
        for (&i, value) in rows.iter().zip(processed) {
            if let (Some(symbol), true) = (&symbols[i], value.is_finite()) {
                records.push(LongRecord::new(symbol.as_str(), date, field, Some(value)));
            }
        }
    }
    WideFrame::from_records(&records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn mean_std(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        (mean, var.sqrt())
    }

    #[test]
    fn test_cross_section_is_standardized() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 100.0];
        let out = process_cross_section(&values, &[], 5.0);
        let (mean, std) = mean_std(&out);
        assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
        assert_relative_eq!(std, 1.0, epsilon = 1e-12);
        // the outlier is clipped before scoring
        assert!(out[4] < 2.0);
    }

    #[test]
    fn test_neutralized_residuals_uncorrelated() {
        let exposure = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let values = vec![2.1, 3.9, 6.2, 7.8, 10.1, 12.0];
        let out = process_cross_section(&values, &[exposure.clone()], 5.0);

        let (em, _) = mean_std(&exposure);
        let cov: f64 = out.iter().zip(&exposure).map(|(r, e)| r * (e - em)).sum();
        assert_relative_eq!(cov, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_exposure_drops_row() {
        let values = vec![1.0, 2.0, 3.0, 5.0];
        let exposure = vec![1.0, f64::NAN, 2.0, 4.0];
        let out = process_cross_section(&values, &[exposure], 5.0);
        assert!(out[1].is_nan());
        assert!(out[0].is_finite());
    }

    #[test]
    fn test_preprocess_per_date() {
        let d1 = Date::from_ymd_opt(2024, 1, 2).unwrap();
        let d2 = Date::from_ymd_opt(2024, 1, 3).unwrap();
        let mut records = Vec::new();
        for (i, symbol) in ["A", "B", "C"].iter().enumerate() {
            records.push(LongRecord::new(*symbol, d1, "bp", Some(i as f64)));
            records.push(LongRecord::new(*symbol, d2, "bp", Some(10.0 * i as f64)));
        }
        records.push(LongRecord::new("D", d2, "bp", None));
        let frame = WideFrame::from_records(&records).unwrap();

        let out = preprocess(&frame, "bp", &PreprocessConfig::default()).unwrap();
        assert_eq!(out.len(), 6);
        // each date is scored on its own cross-section
        assert_relative_eq!(out.value("C", d1, "bp").unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(out.value("C", d2, "bp").unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(out.value("D", d2, "bp"), None);
    }

    #[test]
    fn test_preprocess_missing_exposure_column() {
        let d = Date::from_ymd_opt(2024, 1, 2).unwrap();
        let frame = WideFrame::from_records(&[LongRecord::new("A", d, "bp", Some(1.0))]).unwrap();
        let config = PreprocessConfig {
            exposures: vec!["log_market_cap".to_string()],
            ..PreprocessConfig::default()
        };
        assert!(preprocess(&frame, "bp", &config).is_err());
    }
}
