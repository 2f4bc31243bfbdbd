//! Statistical utility functions for factor conditioning.
//!
//! Cross-sectional helpers used by the factor pipeline: MAD winsorization,
//! z-score standardization and OLS neutralization. Non-finite inputs are
//! treated as missing and pass through as NaN.

use crate::{Result, StrataError};
use ndarray::{Array1, Array2};

/// Minimum threshold for standard deviation to avoid division by zero.
/// Values below this threshold are treated as zero variance.
pub const MIN_STD_THRESHOLD: f64 = 1e-10;

/// Consistency constant that scales a MAD to a normal standard deviation.
pub const MAD_SCALE: f64 = 1.4826;

/// Default number of scaled MADs kept around the median.
pub const DEFAULT_MAD_DEVIATIONS: f64 = 5.0;

/// Z-score standardization result containing computed statistics.
#[derive(Debug, Clone, Copy)]
pub struct StandardizeResult {
    /// The computed mean of the input values.
    pub mean: f64,
    /// The computed sample standard deviation (N-1 denominator).
    pub std: f64,
    /// Whether the standardization was applied (false if variance was too low).
    pub applied: bool,
}

fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().filter(|x| x.is_finite()).copied().collect()
}

/// Median of the finite values, `None` if there are none.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted = finite(values);
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Clip values to `median ± n_dev * 1.4826 * MAD`.
///
/// A zero MAD (all finite values equal) or an all-missing input returns the
/// values unchanged. NaN stays NaN.
///
/// # Examples
///
/// ```
/// use strata_traits::stats::winsorize_mad;
///
/// let values = vec![1.0, 2.0, 3.0, 4.0, 1000.0];
/// let clipped = winsorize_mad(&values, 5.0);
/// assert!(clipped[4] < 1000.0);
/// assert_eq!(clipped[2], 3.0);
/// ```
pub fn winsorize_mad(values: &[f64], n_dev: f64) -> Vec<f64> {
    let Some(med) = median(values) else {
        return values.to_vec();
    };
    let deviations: Vec<f64> = values.iter().map(|x| (x - med).abs()).collect();
    let mad = median(&deviations).unwrap_or(0.0);
    if mad == 0.0 {
        return values.to_vec();
    }

    let width = n_dev * mad * MAD_SCALE;
    let (lower, upper) = (med - width, med + width);
    values
        .iter()
        .map(|&x| if x.is_finite() { x.clamp(lower, upper) } else { x })
        .collect()
}

/// Standardize a slice of f64 values to z-scores (mean=0, std=1).
///
/// Uses sample standard deviation (N-1 denominator). If the standard
/// deviation is below [`MIN_STD_THRESHOLD`] the output is all zeros.
///
/// # Edge Cases
///
/// - Empty input: Returns empty vector with mean=NaN, std=NaN, applied=false
/// - Constant values: Returns zeros with applied=false
/// - Contains NaN/Inf: excluded from mean/std; NaN in input stays NaN in output
///
/// # Examples
///
/// ```
/// use strata_traits::stats::standardize;
///
/// let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
/// let (standardized, result) = standardize(&values);
///
/// assert!(result.applied);
/// assert!((result.mean - 3.0).abs() < 1e-10);
/// assert_eq!(standardized.len(), 5);
/// ```
pub fn standardize(values: &[f64]) -> (Vec<f64>, StandardizeResult) {
    let finite_values = finite(values);
    if finite_values.is_empty() {
        return (
            vec![f64::NAN; values.len()],
            StandardizeResult {
                mean: f64::NAN,
                std: f64::NAN,
                applied: false,
            },
        );
    }

    let n = finite_values.len();
    let mean = finite_values.iter().sum::<f64>() / n as f64;

    // Bessel's correction
    let variance = if n > 1 {
        finite_values
            .iter()
            .map(|x| (x - mean).powi(2))
            .sum::<f64>()
            / (n - 1) as f64
    } else {
        0.0
    };
    let std = variance.sqrt();
    let applied = std > MIN_STD_THRESHOLD;

    let standardized = if applied {
        values.iter().map(|x| (x - mean) / std).collect()
    } else {
        values
            .iter()
            .map(|x| if x.is_finite() { 0.0 } else { f64::NAN })
            .collect()
    };

    (standardized, StandardizeResult { mean, std, applied })
}

/// Regress `factor` on `exposures` plus an intercept and return the residuals.
///
/// `exposures` is a list of columns, each the same length as `factor`. Rows
/// where the factor or any exposure is non-finite are excluded from the fit
/// and come back as NaN.
///
/// # Errors
///
/// Returns [`StrataError::InvalidData`] on mismatched lengths and
/// [`StrataError::InsufficientData`] when the design matrix is singular.
pub fn neutralize(factor: &[f64], exposures: &[Vec<f64>]) -> Result<Vec<f64>> {
    if let Some(bad) = exposures.iter().find(|col| col.len() != factor.len()) {
        return Err(StrataError::InvalidData(format!(
            "exposure length {} does not match factor length {}",
            bad.len(),
            factor.len()
        )));
    }

    let valid: Vec<usize> = (0..factor.len())
        .filter(|&i| factor[i].is_finite() && exposures.iter().all(|col| col[i].is_finite()))
        .collect();
    let mut residuals = vec![f64::NAN; factor.len()];
    if valid.is_empty() {
        return Ok(residuals);
    }

    let k = exposures.len() + 1;
    let mut x = Array2::<f64>::ones((valid.len(), k));
    for (row, &i) in valid.iter().enumerate() {
        for (j, col) in exposures.iter().enumerate() {
            x[[row, j + 1]] = col[i];
        }
    }
    let y = Array1::from_iter(valid.iter().map(|&i| factor[i]));

    let xtx = x.t().dot(&x);
    let xty = x.t().dot(&y);
    let beta = solve(xtx, xty)?;
    let fitted = x.dot(&beta);

    for (row, &i) in valid.iter().enumerate() {
        residuals[i] = y[row] - fitted[row];
    }
    Ok(residuals)
}

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&p, &q| a[[p, col]].abs().total_cmp(&a[[q, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() < MIN_STD_THRESHOLD {
            return Err(StrataError::InsufficientData(
                "singular exposure matrix".to_string(),
            ));
        }
        if pivot != col {
            for j in 0..n {
                a.swap([col, j], [pivot, j]);
            }
            b.swap(col, pivot);
        }
        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            for j in col..n {
                a[[row, j]] -= factor * a[[col, j]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|j| a[[row, j]] * x[j]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(x)
}
