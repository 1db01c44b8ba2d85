//! Conditioning a multivariate normal on observed coordinates.

use crate::error::{ImputeError, Result};
use crate::moments::Moments;
use nalgebra::{DMatrix, DVector};

/// Distribution of target coordinates given the observed ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalNormal {
    /// Conditional mean of the targets.
    pub mean: DVector<f64>,
    /// Conditional covariance of the targets.
    pub covariance: DMatrix<f64>,
}

/// Condition `N(mean, cov)` on `x_O = observed_values`.
///
/// `mu_T|O = mu_T + S_TO S_OO^-1 (x_O - mu_O)` and
/// `S_T|O = S_TT - S_TO S_OO^-1 S_OT`, with `S_OO` factorized by Cholesky.
/// With no observed coordinates the marginal of the targets is returned.
///
/// # Errors
/// `SingularCovariance { row }` if `S_OO` is not positive definite.
pub fn condition_on_observed(
    moments: &Moments,
    observed: &[usize],
    observed_values: &DVector<f64>,
    target: &[usize],
    row: usize,
) -> Result<ConditionalNormal> {
    let mu = &moments.mean;
    let sigma = &moments.covariance;

    let mu_t = DVector::from_iterator(target.len(), target.iter().map(|&k| mu[k]));
    let sigma_tt = DMatrix::from_fn(target.len(), target.len(), |r, c| {
        sigma[(target[r], target[c])]
    });

    if observed.is_empty() {
        return Ok(ConditionalNormal {
            mean: mu_t,
            covariance: sigma_tt,
        });
    }

    let sigma_oo = DMatrix::from_fn(observed.len(), observed.len(), |r, c| {
        sigma[(observed[r], observed[c])]
    });
    let sigma_to = DMatrix::from_fn(target.len(), observed.len(), |r, c| {
        sigma[(target[r], observed[c])]
    });
    let diff = DVector::from_iterator(
        observed.len(),
        observed
            .iter()
            .zip(observed_values.iter())
            .map(|(&k, &v)| v - mu[k]),
    );

    let chol = sigma_oo
        .cholesky()
        .ok_or(ImputeError::SingularCovariance { row })?;

    let mean = mu_t + &sigma_to * chol.solve(&diff);
    let gain = chol.solve(&sigma_to.transpose());
    let reduced = sigma_tt - &sigma_to * gain;
    let covariance = (&reduced + reduced.transpose()) * 0.5;

    Ok(ConditionalNormal { mean, covariance })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bivariate(rho: f64) -> Moments {
        Moments {
            mean: DVector::from_vec(vec![1.0, -1.0]),
            covariance: DMatrix::from_row_slice(2, 2, &[1.0, rho * 2.0, rho * 2.0, 4.0]),
            n_rows: 100,
        }
    }

    #[test]
    fn test_bivariate_conditioning() {
        let m = bivariate(0.5);
        // Condition coordinate 1 on coordinate 0 = 2.0
        let c = condition_on_observed(&m, &[0], &DVector::from_vec(vec![2.0]), &[1], 0).unwrap();
        // mu = -1 + (1.0 / 1.0) * (2 - 1) = 0
        assert_relative_eq!(c.mean[0], 0.0, epsilon = 1e-12);
        // var = 4 - 1^2 / 1 = 3
        assert_relative_eq!(c.covariance[(0, 0)], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_no_observed_returns_marginal() {
        let m = bivariate(0.3);
        let c = condition_on_observed(&m, &[], &DVector::zeros(0), &[0, 1], 0).unwrap();
        assert_eq!(c.mean, m.mean);
        assert_eq!(c.covariance, m.covariance);
    }

    #[test]
    fn test_independent_coordinates_unchanged() {
        let m = bivariate(0.0);
        let c = condition_on_observed(&m, &[1], &DVector::from_vec(vec![10.0]), &[0], 0).unwrap();
        assert_relative_eq!(c.mean[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(c.covariance[(0, 0)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_observed_block() {
        let m = Moments {
            mean: DVector::zeros(3),
            covariance: DMatrix::from_row_slice(
                3,
                3,
                &[
                    1.0, 1.0, 0.5, //
                    1.0, 1.0, 0.5, //
                    0.5, 0.5, 1.0,
                ],
            ),
            n_rows: 10,
        };
        let err = condition_on_observed(&m, &[0, 1], &DVector::from_vec(vec![0.1, 0.2]), &[2], 7)
            .unwrap_err();
        assert!(matches!(err, ImputeError::SingularCovariance { row: 7 }));
    }
}
