//! Provisional placeholders for censored cells.
//!
//! Log-ratios are undefined for censored cells, so before the first transform
//! every censored cell of a usable row is replaced by a fixed fraction of its
//! detection limit. The placeholder depends only on the cell's own part, so
//! seeding is independent of row order.

use crate::censor::{CensoringPattern, DetectionLimits};
use crate::error::{ImputeError, Result};
use nalgebra::DMatrix;

/// Replace censored cells of usable rows with `fraction * limit`.
///
/// Unusable rows are copied unchanged.
///
/// # Arguments
/// * `data` - Raw composition matrix (rows × parts)
/// * `pattern` - Censoring labels from [`classify_rows`](crate::censor::classify_rows)
/// * `limits` - Detection limit per part
/// * `fraction` - Placeholder as a fraction of the limit, in (0, 1)
///
/// # Common choices
/// - 0.5: Midpoint of the censoring interval
/// - 0.65: Rule of thumb from multiplicative replacement literature
pub fn seed_placeholders(
    data: &DMatrix<f64>,
    pattern: &CensoringPattern,
    limits: &DetectionLimits,
    fraction: f64,
) -> Result<DMatrix<f64>> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(ImputeError::Configuration(format!(
            "placeholder fraction must be in (0, 1), got {}",
            fraction
        )));
    }

    let mut seeded = data.clone();
    for (i, row) in pattern.rows().iter().enumerate() {
        for &j in row.censored_parts() {
            seeded[(i, j)] = fraction * limits.get(j);
        }
    }
    Ok(seeded)
}
