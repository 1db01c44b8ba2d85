//! Closure of compositions to a fixed total.

use crate::error::{ImputeError, Result};
use nalgebra::DMatrix;

/// Rescale `parts` so they sum to `total`.
pub fn close(parts: &mut [f64], total: f64) -> Result<()> {
    let sum: f64 = parts.iter().sum();
    if !sum.is_finite() || sum <= 0.0 {
        return Err(ImputeError::Configuration(format!(
            "cannot close a row with sum {}",
            sum
        )));
    }
    let scale = total / sum;
    parts.iter_mut().for_each(|v| *v *= scale);
    Ok(())
}

/// Multiplicative replacement: keep the `imputed` parts fixed and rescale the
/// remaining parts so the row sums to `total`.
///
/// Ratios among the rescaled parts are preserved.
pub fn close_multiplicative(parts: &mut [f64], imputed: &[usize], total: f64) -> Result<()> {
    let imputed_sum: f64 = imputed.iter().map(|&j| parts[j]).sum();
    let observed_sum: f64 = parts.iter().sum::<f64>() - imputed_sum;

    if imputed_sum >= total {
        return Err(ImputeError::Configuration(format!(
            "imputed parts sum to {} which is not below the closure total {}",
            imputed_sum, total
        )));
    }
    if observed_sum <= 0.0 {
        return Err(ImputeError::Configuration(
            "row has no observed mass to rescale".to_string(),
        ));
    }

    let scale = (total - imputed_sum) / observed_sum;
    for (j, v) in parts.iter_mut().enumerate() {
        if !imputed.contains(&j) {
            *v *= scale;
        }
    }
    Ok(())
}

/// Mean row sum over the rows selected by `mask`, or `None` if no rows are
/// selected.
pub fn infer_total(data: &DMatrix<f64>, mask: &[bool]) -> Option<f64> {
    let sums: Vec<f64> = (0..data.nrows())
        .filter(|&i| mask[i])
        .map(|i| data.row(i).sum())
        .collect();
    if sums.is_empty() {
        None
    } else {
        Some(sums.iter().sum::<f64>() / sums.len() as f64)
    }
}
