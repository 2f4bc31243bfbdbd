//! Information Coefficient (IC) calculations.
//!
//! Two flavours are provided: the Pearson IC on raw values and the Spearman
//! rank IC on average ranks. Both drop pairs where either side is not finite.

use ndarray::Array1;

/// Pearson correlation between factor values and forward returns.
///
/// Returns NaN when the inputs differ in length, fewer than two finite pairs
/// remain, or either side is constant.
///
/// # Example
///
/// ```rust,ignore
/// use ndarray::array;
/// use strata_eval::pearson_ic;
///
/// let values = array![1.5, 0.3, -0.8, 2.1];
/// let returns = array![0.02, 0.01, -0.01, 0.03];
/// let ic = pearson_ic(&values, &returns);
/// ```
pub fn pearson_ic(factor_values: &Array1<f64>, forward_returns: &Array1<f64>) -> f64 {
    let Some((x, y)) = finite_pairs(factor_values, forward_returns) else {
        return f64::NAN;
    };
    correlation(&x, &y)
}

/// Spearman rank correlation between factor values and forward returns.
///
/// Ties receive their average rank. NaN cases are the same as [`pearson_ic`].
pub fn spearman_ic(factor_values: &Array1<f64>, forward_returns: &Array1<f64>) -> f64 {
    let Some((x, y)) = finite_pairs(factor_values, forward_returns) else {
        return f64::NAN;
    };
    correlation(&compute_ranks(&x), &compute_ranks(&y))
}

fn finite_pairs(x: &Array1<f64>, y: &Array1<f64>) -> Option<(Vec<f64>, Vec<f64>)> {
    if x.len() != y.len() {
        return None;
    }
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .unzip();
    (xs.len() >= 2).then_some((xs, ys))
}

/// Zero-based ranks of `values`, ties averaged.
pub fn compute_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut indexed: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j < n && (indexed[j].1 - indexed[i].1).abs() < f64::EPSILON {
            j += 1;
        }
        let avg_rank = (i + j - 1) as f64 / 2.0;
        for (idx, _) in &indexed[i..j] {
            ranks[*idx] = avg_rank;
        }
        i = j;
    }
    ranks
}

fn correlation(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    if n < 2.0 {
        return f64::NAN;
    }
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}
