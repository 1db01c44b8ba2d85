//! Maximum-likelihood mean and covariance of log-ratio rows.

use crate::error::{ImputeError, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Mean vector and covariance matrix in log-ratio space.
#[derive(Debug, Clone, PartialEq)]
pub struct Moments {
    /// Mean (length D-1).
    pub mean: DVector<f64>,
    /// Covariance ((D-1) × (D-1)), symmetric.
    pub covariance: DMatrix<f64>,
    /// Number of rows the estimate was computed from.
    pub n_rows: usize,
}

/// Scalar change between successive moment estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConvergenceMetric {
    /// Largest entry-wise change over mean and covariance, relative to the
    /// previous value for entries of magnitude above 1 and absolute below.
    #[default]
    MaxRelative,
    /// Euclidean norm of the mean change plus Frobenius norm of the
    /// covariance change.
    Norm,
}

impl Moments {
    /// Dimension of log-ratio space.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Change from `previous` to `self` under `metric`.
    pub fn change(&self, previous: &Moments, metric: ConvergenceMetric) -> f64 {
        match metric {
            ConvergenceMetric::MaxRelative => {
                let rel = |new: f64, old: f64| (new - old).abs() / old.abs().max(1.0);
                let mean_change = self
                    .mean
                    .iter()
                    .zip(previous.mean.iter())
                    .map(|(&n, &o)| rel(n, o))
                    .fold(0.0_f64, f64::max);
                let cov_change = self
                    .covariance
                    .iter()
                    .zip(previous.covariance.iter())
                    .map(|(&n, &o)| rel(n, o))
                    .fold(0.0_f64, f64::max);
                mean_change.max(cov_change)
            }
            ConvergenceMetric::Norm => {
                (&self.mean - &previous.mean).norm()
                    + (&self.covariance - &previous.covariance).norm()
            }
        }
    }

    /// Standard deviations (square roots of the covariance diagonal).
    pub fn std_devs(&self) -> DVector<f64> {
        self.covariance.diagonal().map(|v| v.max(0.0).sqrt())
    }
}

/// Estimate the mean and population covariance of the rows of `y` selected by
/// `mask`.
///
/// The covariance divides by the row count (maximum likelihood), not count-1.
/// `correction`, when given, is the summed conditional covariance of imputed
/// coordinates; it is added to the scatter matrix before dividing so imputed
/// values are not treated as exact.
///
/// # Errors
/// `InsufficientData` when fewer than `dim + 1` rows are selected.
pub fn estimate_moments(
    y: &DMatrix<f64>,
    mask: &[bool],
    correction: Option<&DMatrix<f64>>,
) -> Result<Moments> {
    let dim = y.ncols();
    if mask.len() != y.nrows() {
        return Err(ImputeError::Configuration(format!(
            "row mask has length {}, matrix has {} rows",
            mask.len(),
            y.nrows()
        )));
    }

    let rows: Vec<usize> = (0..y.nrows()).filter(|&i| mask[i]).collect();
    let n = rows.len();
    if n < dim + 1 {
        return Err(ImputeError::InsufficientData {
            required: dim + 1,
            available: n,
        });
    }

    let mut mean = DVector::zeros(dim);
    for &i in &rows {
        mean += y.row(i).transpose();
    }
    mean /= n as f64;

    let centered = DMatrix::from_fn(n, dim, |r, c| y[(rows[r], c)] - mean[c]);
    let mut scatter = centered.transpose() * &centered;

    if let Some(corr) = correction {
        if corr.shape() != (dim, dim) {
            return Err(ImputeError::Configuration(format!(
                "covariance correction has shape {:?}, expected ({}, {})",
                corr.shape(),
                dim,
                dim
            )));
        }
        scatter += corr;
    }

    let covariance = (&scatter + scatter.transpose()) * (0.5 / n as f64);

    Ok(Moments {
        mean,
        covariance,
        n_rows: n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            4,
            2,
            &[
                1.0, 2.0, //
                3.0, 2.0, //
                1.0, 4.0, //
                3.0, 4.0,
            ],
        )
    }

    #[test]
    fn test_population_covariance() {
        let m = estimate_moments(&sample(), &[true; 4], None).unwrap();

        assert_relative_eq!(m.mean[0], 2.0);
        assert_relative_eq!(m.mean[1], 3.0);
        // Divide by n = 4, not n - 1
        assert_relative_eq!(m.covariance[(0, 0)], 1.0);
        assert_relative_eq!(m.covariance[(1, 1)], 1.0);
        assert_relative_eq!(m.covariance[(0, 1)], 0.0);
        assert_eq!(m.n_rows, 4);
    }

    #[test]
    fn test_mask_excludes_rows() {
        let mut y = sample();
        y[(3, 0)] = 1000.0;
        let m = estimate_moments(&y, &[true, true, true, false], None).unwrap();
        assert_relative_eq!(m.mean[0], 5.0 / 3.0, epsilon = 1e-12);
        assert_eq!(m.n_rows, 3);
    }

    #[test]
    fn test_correction_added() {
        let corr = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 0.0]);
        let m = estimate_moments(&sample(), &[true; 4], Some(&corr)).unwrap();
        assert_relative_eq!(m.covariance[(0, 0)], 2.0);
        assert_relative_eq!(m.covariance[(1, 1)], 1.0);
    }

    #[test]
    fn test_symmetric() {
        let y = DMatrix::from_row_slice(
            4,
            3,
            &[
                0.1, 0.5, -0.2, //
                0.4, -0.3, 0.9, //
                -1.2, 0.8, 0.3, //
                0.6, 0.1, -0.7,
            ],
        );
        let m = estimate_moments(&y, &[true; 4], None).unwrap();
        assert_eq!(m.covariance, m.covariance.transpose());
    }

    #[test]
    fn test_insufficient_rows() {
        let y = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let err = estimate_moments(&y, &[true, true], None).unwrap_err();
        assert!(matches!(
            err,
            ImputeError::InsufficientData {
                required: 3,
                available: 2
            }
        ));
    }

    #[test]
    fn test_change_metrics() {
        let a = estimate_moments(&sample(), &[true; 4], None).unwrap();
        let mut b = a.clone();
        b.mean[1] += 0.3;
        b.covariance[(0, 0)] += 0.1;

        assert_relative_eq!(a.change(&a, ConvergenceMetric::MaxRelative), 0.0);
        // Mean entry 3.0 -> 3.3 is a 10% relative change; variance 1.0 -> 1.1 also 10%
        assert_relative_eq!(
            b.change(&a, ConvergenceMetric::MaxRelative),
            0.1,
            epsilon = 1e-12
        );
        assert_relative_eq!(b.change(&a, ConvergenceMetric::Norm), 0.4, epsilon = 1e-12);
    }
}
