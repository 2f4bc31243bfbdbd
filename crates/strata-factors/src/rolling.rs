//! Time-series helpers over one symbol's dense series.
//!
//! Missing observations are NaN. A window yields a value once it holds at
//! least `min_periods` finite observations, the way pandas counts them.

use strata_traits::{Date, LongRecord, Result, WideFrame};

/// Simple return between consecutive observations; the first is NaN.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for (i, pair) in values.windows(2).enumerate() {
        let (prev, cur) = (pair[0], pair[1]);
        if prev != 0.0 && prev.is_finite() && cur.is_finite() {
            out[i + 1] = cur / prev - 1.0;
        }
    }
    out
}

/// Apply `f` to the finite values of each trailing window.
pub fn rolling(
    values: &[f64],
    window: usize,
    min_periods: usize,
    f: impl Fn(&[f64]) -> f64,
) -> Vec<f64> {
    let window = window.max(1);
    let min_periods = min_periods.clamp(1, window);
    (0..values.len())
        .map(|i| {
            let from = (i + 1).saturating_sub(window);
            let finite: Vec<f64> = values[from..=i].iter().copied().filter(|v| v.is_finite()).collect();
            if finite.len() >= min_periods {
                f(&finite)
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (ddof 1); NaN below two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Recursive exponential moving average with `alpha = 2 / (span + 1)`.
///
/// Seeded with the first finite value; NaN inputs carry the previous average.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span.max(1) as f64 + 1.0);
    let mut state: Option<f64> = None;
    values
        .iter()
        .map(|&x| {
            if x.is_finite() {
                state = Some(state.map_or(x, |s| s + alpha * (x - s)));
            }
            state.unwrap_or(f64::NAN)
        })
        .collect()
}

/// Rolling `cov(y, x) / var(x)` over pairs where both sides are finite.
pub fn rolling_beta(y: &[f64], x: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    let window = window.max(1);
    let min_periods = min_periods.clamp(2, window.max(2));
    (0..y.len().min(x.len()))
        .map(|i| {
            let from = (i + 1).saturating_sub(window);
            let pairs: Vec<(f64, f64)> = y[from..=i]
                .iter()
                .zip(&x[from..=i])
                .filter(|(a, b)| a.is_finite() && b.is_finite())
                .map(|(a, b)| (*a, *b))
                .collect();
            if pairs.len() < min_periods {
                return f64::NAN;
            }
            let n = pairs.len() as f64;
            let my = pairs.iter().map(|p| p.0).sum::<f64>() / n;
            let mx = pairs.iter().map(|p| p.1).sum::<f64>() / n;
            let cov: f64 = pairs.iter().map(|(a, b)| (a - my) * (b - mx)).sum();
            let var: f64 = pairs.iter().map(|(_, b)| (b - mx).powi(2)).sum();
            if var > 0.0 { cov / var } else { f64::NAN }
        })
        .collect()
}

/// Run `f` over each symbol's `input` series and keep finite outputs in `[start, end]`.
///
/// `f` receives the series values in date order and returns one output per value.
pub(crate) fn map_series(
    inputs: &WideFrame,
    input: &str,
    name: &str,
    start: Date,
    end: Date,
    f: impl Fn(&[f64]) -> Vec<f64>,
) -> Result<WideFrame> {
    if inputs.is_empty() {
        return Ok(WideFrame::empty());
    }
    let mut records = Vec::new();
    for (symbol, series) in inputs.series(input)? {
        let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
        for ((date, _), out) in series.iter().zip(f(&values)) {
            if *date >= start && *date <= end && out.is_finite() {
                records.push(LongRecord::new(symbol.as_str(), *date, name, Some(out)));
            }
        }
    }
    WideFrame::from_records(&records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pct_change() {
        let out = pct_change(&[10.0, 11.0, 0.0, 5.0, f64::NAN]);
        assert!(out[0].is_nan());
        assert_relative_eq!(out[1], 0.1, epsilon = 1e-12);
        assert_relative_eq!(out[2], -1.0);
        // zero base
        assert!(out[3].is_nan());
        assert!(out[4].is_nan());
    }

    #[test]
    fn test_rolling_min_periods_counts_finite() {
        let values = [1.0, f64::NAN, 3.0, 5.0];
        let out = rolling(&values, 3, 2, mean);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_relative_eq!(out[2], 2.0);
        assert_relative_eq!(out[3], 4.0);
    }

    #[test]
    fn test_sample_std() {
        assert_relative_eq!(sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.138_089_935_299_395, epsilon = 1e-12);
        assert!(sample_std(&[1.0]).is_nan());
    }

    #[test]
    fn test_ema_recursive() {
        // span 3 -> alpha 0.5
        let out = ema(&[f64::NAN, 2.0, 4.0, f64::NAN, 8.0], 3);
        assert!(out[0].is_nan());
        assert_relative_eq!(out[1], 2.0);
        assert_relative_eq!(out[2], 3.0);
        assert_relative_eq!(out[3], 3.0);
        assert_relative_eq!(out[4], 5.5);
    }

    #[test]
    fn test_rolling_beta_of_scaled_series() {
        let x = [f64::NAN, 0.01, -0.02, 0.03, 0.015];
        let y: Vec<f64> = x.iter().map(|v| 1.5 * v).collect();
        let out = rolling_beta(&y, &x, 4, 3);
        assert!(out[2].is_nan());
        assert_relative_eq!(out[3], 1.5, epsilon = 1e-12);
        assert_relative_eq!(out[4], 1.5, epsilon = 1e-12);
    }
}
