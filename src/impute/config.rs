//! Configuration for EMCOMP imputation.

use crate::error::{ImputeError, Result};
use crate::moments::ConvergenceMetric;
use crate::transform::ReferencePart;
use serde::{Deserialize, Serialize};

/// How imputed rows are expressed in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Closure {
    /// Observed cells are returned unchanged; imputed cells are expressed in
    /// the row's own scale (anchored at the reference part).
    #[default]
    PreserveObserved,
    /// Imputed cells as above, then observed cells of censored rows are
    /// rescaled so the row sums to the fixed total.
    Multiplicative,
}

/// EMCOMP configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmcompConfig {
    /// Convergence tolerance on the change metric.
    pub tolerance: f64,
    /// Maximum EM iterations.
    pub max_iterations: usize,
    /// Change metric between successive moment estimates.
    pub metric: ConvergenceMetric,
    /// Initial placeholder for censored cells, as a fraction of the limit.
    pub placeholder_fraction: f64,
    /// ALR reference part.
    pub reference: ReferencePart,
    /// Output closure.
    pub closure: Closure,
    /// Fixed row total for `Closure::Multiplicative`; inferred from complete
    /// rows when `None`.
    pub total: Option<f64>,
    /// Treat exact zeros as below detection.
    pub zeros_as_censored: bool,
    /// Sweep censored rows in parallel.
    pub parallel: bool,
}

impl Default for EmcompConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            max_iterations: 30,
            metric: ConvergenceMetric::MaxRelative,
            placeholder_fraction: 0.5,
            reference: ReferencePart::Auto,
            closure: Closure::PreserveObserved,
            total: None,
            zeros_as_censored: true,
            parallel: true,
        }
    }
}

impl EmcompConfig {
    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the change metric.
    pub fn with_metric(mut self, metric: ConvergenceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the placeholder fraction.
    pub fn with_placeholder_fraction(mut self, fraction: f64) -> Self {
        self.placeholder_fraction = fraction;
        self
    }

    /// Set the ALR reference part.
    pub fn with_reference(mut self, reference: ReferencePart) -> Self {
        self.reference = reference;
        self
    }

    /// Set the output closure, optionally with a fixed total.
    pub fn with_closure(mut self, closure: Closure, total: Option<f64>) -> Self {
        self.closure = closure;
        self.total = total;
        self
    }

    /// Treat exact zeros as censored or as invalid observations.
    pub fn with_zeros_as_censored(mut self, zeros_as_censored: bool) -> Self {
        self.zeros_as_censored = zeros_as_censored;
        self
    }

    /// Enable or disable the parallel E-step.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ImputeError::Configuration(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(ImputeError::Configuration(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.placeholder_fraction > 0.0 && self.placeholder_fraction < 1.0) {
            return Err(ImputeError::Configuration(format!(
                "placeholder_fraction must be in (0, 1), got {}",
                self.placeholder_fraction
            )));
        }
        if let Some(total) = self.total {
            if !(total.is_finite() && total > 0.0) {
                return Err(ImputeError::Configuration(format!(
                    "total must be positive, got {}",
                    total
                )));
            }
        }
        Ok(())
    }

    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(ImputeError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EmcompConfig::default();
        assert_eq!(config.tolerance, 0.01);
        assert_eq!(config.max_iterations, 30);
        assert_eq!(config.placeholder_fraction, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(EmcompConfig::default().with_tolerance(0.0).validate().is_err());
        assert!(EmcompConfig::default().with_max_iterations(0).validate().is_err());
        assert!(EmcompConfig::default()
            .with_placeholder_fraction(1.5)
            .validate()
            .is_err());
        assert!(EmcompConfig::default()
            .with_closure(Closure::Multiplicative, Some(-1.0))
            .validate()
            .is_err());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = EmcompConfig::default()
            .with_tolerance(1e-4)
            .with_reference(ReferencePart::Index(2))
            .with_closure(Closure::Multiplicative, Some(100.0));
        let yaml = config.to_yaml().unwrap();
        let back = EmcompConfig::from_yaml(&yaml).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_yaml_partial_uses_defaults() {
        let config = EmcompConfig::from_yaml("tolerance: 0.001\nmax_iterations: 50\n").unwrap();
        assert_eq!(config.tolerance, 0.001);
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.closure, Closure::PreserveObserved);
    }
}
