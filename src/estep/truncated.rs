//! Moments of an upper-truncated univariate normal.
//!
//! For `X ~ N(m, s^2)` restricted to `X < b`, with `z = (b - m) / s` and the
//! inverse Mills ratio `lambda = phi(z) / Phi(z)`:
//!
//! - `E[X | X < b] = m - s * lambda`
//! - `Var[X | X < b] = s^2 * (1 - z * lambda - lambda^2)`
//!
//! Two regions need care. Far in the lower tail `Phi(z)` underflows and the
//! variance formula cancels catastrophically, so below [`DEEP_TRUNCATION_Z`]
//! the asymptotic expansions of both quantities are used. Far in the upper tail
//! the truncation does not bind, so above [`NO_TRUNCATION_Z`] the untruncated
//! moments are returned directly.

use statrs::function::erf::erfc;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Below this standardized bound the asymptotic expansion is used.
pub const DEEP_TRUNCATION_Z: f64 = -8.0;

/// Above this standardized bound the truncation is ignored.
pub const NO_TRUNCATION_Z: f64 = 8.0;

/// Standard deviations below this are treated as a point mass.
const MIN_SD: f64 = 1e-12;

/// Mean and variance of a truncated normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TruncatedMoments {
    pub mean: f64,
    pub variance: f64,
}

/// Standard normal density.
pub fn standard_normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * PI).sqrt()
}

/// Standard normal CDF via the complementary error function, accurate far
/// into the lower tail.
pub fn standard_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z * FRAC_1_SQRT_2)
}

/// Inverse Mills ratio `phi(z) / Phi(z)`.
pub fn inverse_mills_ratio(z: f64) -> f64 {
    if z < DEEP_TRUNCATION_Z {
        -z + lower_tail_excess(-z)
    } else {
        standard_normal_pdf(z) / standard_normal_cdf(z)
    }
}

/// `lambda(-t) - t` for large `t`: how far the truncated mean sits below the
/// bound, in standard deviations. Always positive.
fn lower_tail_excess(t: f64) -> f64 {
    let t2 = t * t;
    1.0 / t - 2.0 / (t2 * t) + 10.0 / (t2 * t2 * t)
}

/// Largest value this function treats as strictly below `bound`.
fn strictly_below(bound: f64) -> f64 {
    bound - bound.abs().max(1.0) * f64::EPSILON
}

/// Moments of `N(mean, sd^2)` truncated to values below `bound`.
///
/// The returned mean is always strictly below `bound`, including when `sd` is
/// tiny next to the gap `bound - mean` and the exact answer would round onto
/// the bound.
pub fn upper_truncated_moments(mean: f64, sd: f64, bound: f64) -> TruncatedMoments {
    let ceiling = strictly_below(bound);

    if sd <= MIN_SD {
        return TruncatedMoments {
            mean: mean.min(ceiling),
            variance: 0.0,
        };
    }

    let z = (bound - mean) / sd;

    if z > NO_TRUNCATION_Z {
        return TruncatedMoments {
            mean: mean.min(ceiling),
            variance: sd * sd,
        };
    }

    // Deep in the tail the mean is measured down from the bound, not up from
    // the untruncated mean, so the small gap is not lost to cancellation
    let (truncated_mean, variance_factor) = if z < DEEP_TRUNCATION_Z {
        let t2 = z * z;
        (
            bound - sd * lower_tail_excess(-z),
            1.0 / t2 - 6.0 / (t2 * t2) + 50.0 / (t2 * t2 * t2),
        )
    } else {
        let lambda = inverse_mills_ratio(z);
        (mean - sd * lambda, 1.0 - z * lambda - lambda * lambda)
    };

    TruncatedMoments {
        mean: truncated_mean.min(ceiling),
        variance: sd * sd * variance_factor.max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cdf_reference_values() {
        assert_relative_eq!(standard_normal_cdf(0.0), 0.5, epsilon = 1e-15);
        assert_relative_eq!(standard_normal_cdf(1.96), 0.9750021048517795, epsilon = 1e-12);
        assert!(standard_normal_cdf(-30.0) > 0.0);
    }

    #[test]
    fn test_truncation_at_mean() {
        // Half-normal below the mean: E = -sqrt(2/pi), Var = 1 - 2/pi
        let m = upper_truncated_moments(0.0, 1.0, 0.0);
        assert_relative_eq!(m.mean, -(2.0 / PI).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(m.variance, 1.0 - 2.0 / PI, epsilon = 1e-12);
    }

    #[test]
    fn test_location_scale() {
        let m = upper_truncated_moments(3.0, 2.0, 3.0);
        assert_relative_eq!(m.mean, 3.0 - 2.0 * (2.0 / PI).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(m.variance, 4.0 * (1.0 - 2.0 / PI), epsilon = 1e-12);
    }

    #[test]
    fn test_mean_below_bound_in_every_region() {
        for &bound in &[-50.0, -9.0, -8.0, -3.0, 0.0, 2.5, 7.9, 8.1, 40.0] {
            let m = upper_truncated_moments(0.0, 1.0, bound);
            assert!(m.mean < bound, "bound {}: mean {}", bound, m.mean);
            assert!(m.variance >= 0.0);
            assert!(m.variance <= 1.0);
        }
    }

    #[test]
    fn test_deep_branch_matches_exact_at_cutoff() {
        let z = DEEP_TRUNCATION_Z;
        let exact = standard_normal_pdf(z) / standard_normal_cdf(z);
        let just_below = inverse_mills_ratio(z - 1e-9);
        assert_relative_eq!(just_below, exact, max_relative = 1e-5);

        let inside = upper_truncated_moments(0.0, 1.0, z + 1e-9);
        let outside = upper_truncated_moments(0.0, 1.0, z - 1e-9);
        assert_relative_eq!(inside.mean, outside.mean, max_relative = 1e-5);
        assert_relative_eq!(inside.variance, outside.variance, max_relative = 1e-2);
    }

    #[test]
    fn test_deep_truncation_pins_to_bound() {
        // Bound 40 sd below the mean: mean sits just under the bound, variance ~ 1/z^2
        let m = upper_truncated_moments(0.0, 0.5, -20.0);
        assert!(m.mean < -20.0);
        assert!(m.mean > -20.0 - 0.5 / 40.0 * 1.01);
        assert_relative_eq!(m.variance, 0.25 / 1600.0, max_relative = 1e-2);
        assert!(m.mean.is_finite() && m.variance.is_finite());
    }

    #[test]
    fn test_no_truncation_short_circuit() {
        let m = upper_truncated_moments(1.5, 0.3, 1.5 + 0.3 * 9.0);
        assert_eq!(m.mean, 1.5);
        assert_eq!(m.variance, 0.09);
    }

    #[test]
    fn test_point_mass() {
        let m = upper_truncated_moments(-2.0, 0.0, 1.0);
        assert_eq!(m.mean, -2.0);
        assert_eq!(m.variance, 0.0);

        let clipped = upper_truncated_moments(2.0, 0.0, 1.0);
        assert!(clipped.mean < 1.0);

        // `bound - 1e-12` rounds back to the bound at this magnitude
        let far = upper_truncated_moments(0.0, 0.0, -1e5);
        assert!(far.mean < -1e5);
        assert_eq!(far.variance, 0.0);
    }

    #[test]
    fn test_small_sd_stays_strictly_below_bound() {
        let cases = [
            (0.0, 1e-10, -1.0),
            (0.0, 1e-9, -3.0),
            (0.0, 1.0, -1e9),
            (5.0, 1e-6, -250.0),
            (0.0, 1e-11, 1e-10),
            (-1e6, 1e-3, -1e6 + 1e-3 * 20.0),
        ];
        for &(mean, sd, bound) in &cases {
            let m = upper_truncated_moments(mean, sd, bound);
            assert!(
                m.mean < bound,
                "mean {} sd {} bound {}: got {}",
                mean,
                sd,
                bound,
                m.mean
            );
            assert!(m.mean.is_finite());
            assert!(m.variance >= 0.0 && m.variance <= sd * sd);
        }
    }

    #[test]
    fn test_deep_mean_measured_from_bound() {
        // Gap of 20 sd: mean sits about sd/20 below the bound
        let m = upper_truncated_moments(0.0, 1e-3, -0.02);
        let expected = -0.02 - 1e-3 * (1.0 / 20.0 - 2.0 / 8000.0 + 10.0 / 3.2e6);
        assert_relative_eq!(m.mean, expected, max_relative = 1e-12);
    }
}
