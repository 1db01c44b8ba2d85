//! Expectation sweep over censored rows.
//!
//! Given the current moments, every censored log-ratio coordinate is replaced
//! by its truncated conditional expectation and the matching conditional
//! covariance is recorded for the next covariance update. Rows are independent
//! given the moment snapshot, so the sweep runs in parallel when requested;
//! results are written back in row order, so parallel and serial sweeps give
//! identical output.

use crate::censor::{CensoringPattern, DetectionLimits};
use crate::error::Result;
use crate::estep::conditional::condition_on_observed;
use crate::estep::truncated::upper_truncated_moments;
use crate::moments::Moments;
use crate::transform::AlrTransform;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

/// Conditional covariance of the imputed coordinates of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowCorrection {
    /// Row index.
    pub row: usize,
    /// Log-ratio coordinates that were imputed.
    pub coordinates: Vec<usize>,
    /// Covariance of the imputed coordinates (same order as `coordinates`).
    pub covariance: DMatrix<f64>,
}

/// Output of one expectation sweep.
#[derive(Debug, Clone)]
pub struct ExpectationSweep {
    /// Log-ratio matrix with every censored coordinate refreshed.
    pub completed: DMatrix<f64>,
    /// Per-row covariance corrections, in row order.
    pub corrections: Vec<RowCorrection>,
}

impl ExpectationSweep {
    /// Sum of the per-row corrections, scattered into a `dim × dim` matrix.
    pub fn total_correction(&self, dim: usize) -> DMatrix<f64> {
        let mut total = DMatrix::zeros(dim, dim);
        for corr in &self.corrections {
            for (a, &ka) in corr.coordinates.iter().enumerate() {
                for (b, &kb) in corr.coordinates.iter().enumerate() {
                    total[(ka, kb)] += corr.covariance[(a, b)];
                }
            }
        }
        total
    }
}

struct RowImputation {
    values: Vec<f64>,
    correction: RowCorrection,
}

/// Log-ratio upper bounds for every censored cell (`NaN` elsewhere).
///
/// The bound of part `j` in row `i` is `ln(limit_j / x_{i,ref})`, which depends
/// on the row's observed reference value.
pub fn censoring_bounds(
    data: &DMatrix<f64>,
    pattern: &CensoringPattern,
    limits: &DetectionLimits,
    transform: &AlrTransform,
) -> DMatrix<f64> {
    let mut bounds = DMatrix::from_element(data.nrows(), transform.dim(), f64::NAN);
    let reference = transform.reference();
    for (i, row) in pattern.rows().iter().enumerate() {
        for &j in row.censored_parts() {
            if let Some(k) = transform.coordinate(j) {
                bounds[(i, k)] = transform.bound(limits.get(j), data[(i, reference)]);
            }
        }
    }
    bounds
}

/// Run one expectation sweep.
///
/// # Arguments
/// * `y` - Current log-ratio matrix (rows × (D-1))
/// * `bounds` - Censoring bounds from [`censoring_bounds`]
/// * `pattern` - Censoring labels
/// * `transform` - ALR transform that produced `y`
/// * `moments` - Current mean/covariance snapshot (read-only)
/// * `parallel` - Sweep rows with rayon
///
/// # Errors
/// `SingularCovariance` if the observed sub-covariance of any row cannot be
/// factorized.
pub fn expectation_step(
    y: &DMatrix<f64>,
    bounds: &DMatrix<f64>,
    pattern: &CensoringPattern,
    transform: &AlrTransform,
    moments: &Moments,
    parallel: bool,
) -> Result<ExpectationSweep> {
    let censored: Vec<(usize, Vec<usize>)> = pattern
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_censored())
        .map(|(i, r)| {
            let coords = r
                .censored_parts()
                .iter()
                .filter_map(|&j| transform.coordinate(j))
                .collect();
            (i, coords)
        })
        .collect();

    let run = |(i, coords): &(usize, Vec<usize>)| impute_row(*i, coords, y, bounds, moments);
    let imputations: Vec<RowImputation> = if parallel {
        censored.par_iter().map(run).collect::<Result<Vec<_>>>()?
    } else {
        censored.iter().map(run).collect::<Result<Vec<_>>>()?
    };

    let mut completed = y.clone();
    let mut corrections = Vec::with_capacity(imputations.len());
    for imp in imputations {
        let row = imp.correction.row;
        for (&k, &v) in imp.correction.coordinates.iter().zip(imp.values.iter()) {
            completed[(row, k)] = v;
        }
        corrections.push(imp.correction);
    }

    Ok(ExpectationSweep {
        completed,
        corrections,
    })
}

/// Truncated conditional expectation of the censored coordinates of one row.
fn impute_row(
    row: usize,
    censored: &[usize],
    y: &DMatrix<f64>,
    bounds: &DMatrix<f64>,
    moments: &Moments,
) -> Result<RowImputation> {
    let observed: Vec<usize> = (0..y.ncols()).filter(|k| !censored.contains(k)).collect();
    let observed_values =
        DVector::from_iterator(observed.len(), observed.iter().map(|&k| y[(row, k)]));

    let cond = condition_on_observed(moments, &observed, &observed_values, censored, row)?;

    let mut values = Vec::with_capacity(censored.len());
    let mut scale = Vec::with_capacity(censored.len());
    for (a, &k) in censored.iter().enumerate() {
        let var = cond.covariance[(a, a)].max(0.0);
        let truncated = upper_truncated_moments(cond.mean[a], var.sqrt(), bounds[(row, k)]);
        values.push(truncated.mean);
        // Shrink the conditional covariance to the truncated variances while
        // keeping its correlation structure (stays positive semi-definite)
        scale.push(if var > 0.0 {
            (truncated.variance / var).sqrt()
        } else {
            0.0
        });
    }

    let n = censored.len();
    let covariance = DMatrix::from_fn(n, n, |a, b| scale[a] * scale[b] * cond.covariance[(a, b)]);

    Ok(RowImputation {
        values,
        correction: RowCorrection {
            row,
            coordinates: censored.to_vec(),
            covariance,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::censor::classify_rows;
    use crate::zero::seed_placeholders;

    const NAN: f64 = f64::NAN;

    fn setup() -> (DMatrix<f64>, CensoringPattern, DetectionLimits, AlrTransform) {
        let data = DMatrix::from_row_slice(
            5,
            3,
            &[
                0.50, 0.30, 0.20, //
                0.40, 0.35, 0.25, //
                0.45, 0.25, 0.30, //
                0.60, NAN, 0.30, //
                0.55, 0.30, NAN,
            ],
        );
        let limits = DetectionLimits::uniform(0.1, 3).unwrap();
        let pattern = classify_rows(&data, &limits, true).unwrap();
        let transform = AlrTransform::new(3, 0, 1.0).unwrap();
        (data, pattern, limits, transform)
    }

    fn moments() -> Moments {
        Moments {
            mean: DVector::from_vec(vec![-0.5, -0.6]),
            covariance: DMatrix::from_row_slice(2, 2, &[0.2, 0.05, 0.05, 0.3]),
            n_rows: 5,
        }
    }

    #[test]
    fn test_bounds() {
        let (data, pattern, limits, transform) = setup();
        let bounds = censoring_bounds(&data, &pattern, &limits, &transform);
        assert!((bounds[(3, 0)] - (0.1_f64 / 0.6).ln()).abs() < 1e-12);
        assert!((bounds[(4, 1)] - (0.1_f64 / 0.55).ln()).abs() < 1e-12);
        assert!(bounds[(0, 0)].is_nan());
        assert!(bounds[(3, 1)].is_nan());
    }

    #[test]
    fn test_imputed_values_respect_bounds() {
        let (data, pattern, limits, transform) = setup();
        let seeded = seed_placeholders(&data, &pattern, &limits, 0.5).unwrap();
        let y = transform.forward_rows(&seeded, &pattern.usable_mask()).unwrap();
        let bounds = censoring_bounds(&data, &pattern, &limits, &transform);

        let sweep = expectation_step(&y, &bounds, &pattern, &transform, &moments(), false).unwrap();

        assert!(sweep.completed[(3, 0)] < bounds[(3, 0)]);
        assert!(sweep.completed[(4, 1)] < bounds[(4, 1)]);
        // Observed coordinates untouched
        assert_eq!(sweep.completed[(3, 1)], y[(3, 1)]);
        assert_eq!(sweep.completed.row(0), y.row(0));
        assert_eq!(sweep.corrections.len(), 2);
        assert_eq!(sweep.corrections[0].row, 3);
        assert!(sweep.corrections[0].covariance[(0, 0)] > 0.0);
        assert!(sweep.corrections[0].covariance[(0, 0)] < 0.2);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let (data, pattern, limits, transform) = setup();
        let seeded = seed_placeholders(&data, &pattern, &limits, 0.5).unwrap();
        let y = transform.forward_rows(&seeded, &pattern.usable_mask()).unwrap();
        let bounds = censoring_bounds(&data, &pattern, &limits, &transform);

        let serial = expectation_step(&y, &bounds, &pattern, &transform, &moments(), false).unwrap();
        let parallel = expectation_step(&y, &bounds, &pattern, &transform, &moments(), true).unwrap();
        assert_eq!(serial.completed, parallel.completed);
        assert_eq!(serial.corrections, parallel.corrections);
    }

    #[test]
    fn test_total_correction_scatter() {
        let sweep = ExpectationSweep {
            completed: DMatrix::zeros(2, 3),
            corrections: vec![
                RowCorrection {
                    row: 0,
                    coordinates: vec![0, 2],
                    covariance: DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 2.0]),
                },
                RowCorrection {
                    row: 1,
                    coordinates: vec![2],
                    covariance: DMatrix::from_element(1, 1, 3.0),
                },
            ],
        };
        let total = sweep.total_correction(3);
        assert_eq!(total[(0, 0)], 1.0);
        assert_eq!(total[(0, 2)], 0.5);
        assert_eq!(total[(2, 0)], 0.5);
        assert_eq!(total[(2, 2)], 5.0);
        assert_eq!(total[(1, 1)], 0.0);
    }
}
