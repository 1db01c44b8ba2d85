//! Moment estimation in log-ratio space.

pub mod estimator;

pub use estimator::{estimate_moments, ConvergenceMetric, Moments};
