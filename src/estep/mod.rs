//! Expectation step: truncated conditional expectations of censored
//! log-ratio coordinates.

pub mod conditional;
pub mod sweep;
pub mod truncated;

pub use conditional::{condition_on_observed, ConditionalNormal};
pub use sweep::{censoring_bounds, expectation_step, ExpectationSweep, RowCorrection};
pub use truncated::{
    inverse_mills_ratio, standard_normal_cdf, standard_normal_pdf, upper_truncated_moments,
    TruncatedMoments, DEEP_TRUNCATION_Z, NO_TRUNCATION_Z,
};
