//! Internal-consistency reliability (Cronbach's alpha)
//!
//! Degenerate inputs (fewer than two items, zero or undefined total variance) return
//! `0.0` instead of failing: zero is below any reliability threshold, which is what
//! drives the short-form repair pass.

/// Arithmetic mean; `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample variance (denominator n − 1); `None` for fewer than two values
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some(ss / (values.len() - 1) as f64)
}

/// Cronbach's alpha over a complete score matrix
///
/// `matrix` rows are respondents and columns are items. Rows must all have the same
/// width and contain no missing values; complete-case filtering is the caller's job.
///
/// `alpha = (k / (k - 1)) * (1 - Σ item_var / total_var)`
///
/// The result is not clamped: pathological inputs can exceed 1 or go negative.
pub fn cronbach_alpha(matrix: &[Vec<f64>]) -> f64 {
    let k = matrix.first().map(|row| row.len()).unwrap_or(0);
    if k < 2 {
        return 0.0;
    }

    let totals: Vec<f64> = matrix.iter().map(|row| row.iter().sum()).collect();
    let total_var = match sample_variance(&totals) {
        Some(v) if v.is_finite() && v != 0.0 => v,
        _ => return 0.0,
    };

    let mut item_var_sum = 0.0;
    for col in 0..k {
        let column: Vec<f64> = matrix.iter().map(|row| row[col]).collect();
        item_var_sum += sample_variance(&column).unwrap_or(f64::NAN);
    }
    if !item_var_sum.is_finite() {
        return 0.0;
    }

    let k = k as f64;
    (k / (k - 1.0)) * (1.0 - item_var_sum / total_var)
}
