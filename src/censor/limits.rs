//! Per-part detection limits.

use crate::error::{ImputeError, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Lower detection limit for each part, in the units of the data.
///
/// A censored cell in part `j` is known only to lie in `[0, limit_j)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionLimits {
    values: Vec<f64>,
}

impl DetectionLimits {
    /// Create limits from explicit values. Every value must be finite and
    /// non-negative.
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(ImputeError::Configuration(
                "detection limit vector is empty".to_string(),
            ));
        }
        for (j, &v) in values.iter().enumerate() {
            if !v.is_finite() || v < 0.0 {
                return Err(ImputeError::Configuration(format!(
                    "detection limit for part {} must be finite and non-negative, got {}",
                    j, v
                )));
            }
        }
        Ok(Self { values })
    }

    /// The same limit for every part.
    pub fn uniform(value: f64, n_parts: usize) -> Result<Self> {
        Self::new(vec![value; n_parts])
    }

    /// Per-part percentile of the observed (non-NaN) values, with linear
    /// interpolation between order statistics.
    ///
    /// `percentile` is on the 0-100 scale.
    pub fn from_percentile(data: &DMatrix<f64>, percentile: f64) -> Result<Self> {
        if !(0.0..=100.0).contains(&percentile) {
            return Err(ImputeError::Configuration(format!(
                "percentile must be in [0, 100], got {}",
                percentile
            )));
        }

        let mut values = Vec::with_capacity(data.ncols());
        for j in 0..data.ncols() {
            let mut observed: Vec<f64> = data
                .column(j)
                .iter()
                .copied()
                .filter(|v| !v.is_nan())
                .collect();
            if observed.is_empty() {
                return Err(ImputeError::Configuration(format!(
                    "part {} has no observed values to derive a detection limit from",
                    j
                )));
            }
            observed.sort_by(|a, b| a.total_cmp(b));
            values.push(interpolated_percentile(&observed, percentile));
        }

        Self::new(values)
    }

    /// Limit for part `j`.
    pub fn get(&self, j: usize) -> f64 {
        self.values[j]
    }

    /// Number of parts covered.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no parts are covered (never the case for a constructed value).
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All limits.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Check that there is exactly one limit per part.
    pub fn check_parts(&self, n_parts: usize) -> Result<()> {
        if self.values.len() != n_parts {
            return Err(ImputeError::Configuration(format!(
                "detection limit vector has length {}, data has {} parts",
                self.values.len(),
                n_parts
            )));
        }
        Ok(())
    }
}

/// Percentile of sorted values (numpy's default "linear" method).
fn interpolated_percentile(sorted: &[f64], percentile: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = percentile / 100.0 * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}
