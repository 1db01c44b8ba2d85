//! Synthetic compositional data with injected censoring.
//!
//! Compositions are drawn from a logistic-normal distribution: ALR coordinates
//! (first part as divisor) are multivariate normal with a random covariance of
//! prescribed scale, mapped back to the unit simplex, and then a share of the
//! values in selected parts is removed according to a missingness mechanism.

use crate::censor::MIN_PARTS;
use crate::data::CompositionMatrix;
use crate::error::{ImputeError, Result};
use crate::transform::AlrTransform;
use nalgebra::{DMatrix, DVector};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How missing cells are chosen within each missing part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MissingMechanism {
    /// Missing completely at random: uniformly chosen rows.
    Mcar,
    /// Missing at random: rows with the lowest values of the first part that
    /// is never made missing.
    Mar,
    /// Missing not at random: the lowest values of the part itself, i.e.
    /// below-detection censoring.
    Mnar,
}

/// Configuration for synthetic data generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Name/identifier for this dataset.
    pub name: String,
    /// Number of rows (observations).
    pub n_rows: usize,
    /// Number of parts (D).
    pub n_parts: usize,
    /// Standard deviations of the D-1 ALR coordinates.
    pub sigmas: Vec<f64>,
    /// Mean of the ALR coordinates; zeros when absent.
    pub mean: Option<Vec<f64>>,
    /// Proportion of rows made missing in each missing part.
    pub proportion_missing: f64,
    /// Missingness mechanism.
    pub mechanism: MissingMechanism,
    /// Parts that receive missing values.
    pub missing_parts: Vec<usize>,
    /// Random seed for reproducibility.
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "synthetic".to_string(),
            n_rows: 1000,
            n_parts: 4,
            sigmas: vec![0.1, 0.3, 0.15],
            mean: None,
            proportion_missing: 0.1,
            mechanism: MissingMechanism::Mnar,
            missing_parts: vec![3],
            seed: 42,
        }
    }
}

impl SyntheticConfig {
    /// Create a new config with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Set dimensions. Resets sigmas to 0.2 per coordinate when the part count
    /// changes.
    pub fn with_dimensions(mut self, n_rows: usize, n_parts: usize) -> Self {
        if n_parts != self.n_parts {
            self.sigmas = vec![0.2; n_parts.saturating_sub(1)];
            self.mean = None;
        }
        self.n_rows = n_rows;
        self.n_parts = n_parts;
        self
    }

    /// Set ALR coordinate standard deviations.
    pub fn with_sigmas(mut self, sigmas: Vec<f64>) -> Self {
        self.sigmas = sigmas;
        self
    }

    /// Set the ALR mean.
    pub fn with_mean(mut self, mean: Vec<f64>) -> Self {
        self.mean = Some(mean);
        self
    }

    /// Set missingness proportion, mechanism and affected parts.
    pub fn with_missing(
        mut self,
        proportion: f64,
        mechanism: MissingMechanism,
        parts: Vec<usize>,
    ) -> Self {
        self.proportion_missing = proportion;
        self.mechanism = mechanism;
        self.missing_parts = parts;
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check the configuration is internally consistent.
    pub fn validate(&self) -> Result<()> {
        if self.n_parts < MIN_PARTS {
            return Err(ImputeError::Configuration(format!(
                "synthetic data needs at least {} parts, got {}",
                MIN_PARTS, self.n_parts
            )));
        }
        if self.n_rows == 0 {
            return Err(ImputeError::Configuration("n_rows must be positive".to_string()));
        }
        let dim = self.n_parts - 1;
        if self.sigmas.len() != dim || self.sigmas.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ImputeError::Configuration(format!(
                "expected {} positive sigmas, got {:?}",
                dim, self.sigmas
            )));
        }
        if let Some(mean) = &self.mean {
            if mean.len() != dim || mean.iter().any(|m| !m.is_finite()) {
                return Err(ImputeError::Configuration(format!(
                    "expected {} finite mean coordinates, got {:?}",
                    dim, mean
                )));
            }
        }
        if !(0.0..1.0).contains(&self.proportion_missing) {
            return Err(ImputeError::Configuration(format!(
                "proportion_missing must be in [0, 1), got {}",
                self.proportion_missing
            )));
        }
        let mut parts = self.missing_parts.clone();
        parts.sort_unstable();
        parts.dedup();
        if parts.len() != self.missing_parts.len() {
            return Err(ImputeError::Configuration(
                "missing_parts contains duplicates".to_string(),
            ));
        }
        if let Some(&p) = parts.iter().find(|&&p| p >= self.n_parts) {
            return Err(ImputeError::Configuration(format!(
                "missing part {} out of range for {} parts",
                p, self.n_parts
            )));
        }
        if parts.len() >= self.n_parts {
            return Err(ImputeError::Configuration(
                "at least one part must stay fully observed".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of synthetic data generation.
#[derive(Debug, Clone)]
pub struct SyntheticComposition {
    /// Compositions with missing cells set to `NaN`.
    pub data: CompositionMatrix,
    /// Complete compositions before missingness was injected.
    pub truth: DMatrix<f64>,
    /// Mask of injected missing cells.
    pub missing: DMatrix<bool>,
    /// Covariance of the ALR coordinates.
    pub covariance: DMatrix<f64>,
    /// Configuration used.
    pub config: SyntheticConfig,
}

impl SyntheticComposition {
    /// Proportion of rows with at least one missing cell.
    pub fn p0(&self) -> f64 {
        let n_rows = self.missing.nrows();
        let affected = (0..n_rows)
            .filter(|&i| self.missing.row(i).iter().any(|&m| m))
            .count();
        affected as f64 / n_rows as f64
    }

    /// Number of injected missing cells.
    pub fn n_missing(&self) -> usize {
        self.missing.iter().filter(|&&m| m).count()
    }

    /// Write `data.tsv`, `truth.tsv` and `config.yaml` to a directory.
    pub fn write_to_dir(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        self.data.to_tsv(dir.join("data.tsv"))?;
        self.data
            .with_values(self.truth.clone())?
            .to_tsv(dir.join("truth.tsv"))?;

        let config_yaml = serde_yaml::to_string(&self.config)?;
        std::fs::write(dir.join("config.yaml"), config_yaml)?;

        Ok(())
    }
}

/// Draw a random covariance matrix with the given marginal standard deviations.
///
/// A random Gram matrix is converted to a correlation matrix and rescaled, so
/// the diagonal is exactly `sigmas[i]^2`.
pub fn random_cov_matrix<R: Rng>(dim: usize, sigmas: &[f64], rng: &mut R) -> Result<DMatrix<f64>> {
    if dim == 0 || sigmas.len() != dim {
        return Err(ImputeError::Configuration(format!(
            "expected {} sigmas, got {}",
            dim,
            sigmas.len()
        )));
    }

    let a = DMatrix::from_fn(dim, dim, |_, _| rng.sample::<f64, _>(StandardNormal));
    let mut gram = &a * a.transpose();
    // Ridge keeps the correlations away from +-1
    for i in 0..dim {
        gram[(i, i)] += 1.0;
    }

    let scale: Vec<f64> = (0..dim).map(|i| gram[(i, i)].sqrt()).collect();
    Ok(DMatrix::from_fn(dim, dim, |i, j| {
        sigmas[i] * sigmas[j] * gram[(i, j)] / (scale[i] * scale[j])
    }))
}

/// Generate compositions with injected missingness using the given generator.
pub fn random_composition<R: Rng>(
    config: &SyntheticConfig,
    rng: &mut R,
) -> Result<SyntheticComposition> {
    config.validate()?;
    let covariance = random_cov_matrix(config.n_parts - 1, &config.sigmas, rng)?;
    random_composition_with_cov(config, covariance, rng)
}

/// Generate compositions from an explicit ALR covariance, ignoring
/// `config.sigmas`.
pub fn random_composition_with_cov<R: Rng>(
    config: &SyntheticConfig,
    covariance: DMatrix<f64>,
    rng: &mut R,
) -> Result<SyntheticComposition> {
    let n_rows = config.n_rows;
    let n_parts = config.n_parts;
    let dim = n_parts.saturating_sub(1);
    if covariance.shape() != (dim, dim) {
        return Err(ImputeError::Configuration(format!(
            "covariance has shape {:?}, expected ({}, {})",
            covariance.shape(),
            dim,
            dim
        )));
    }
    let sigmas = covariance.diagonal().iter().map(|v| v.max(0.0).sqrt()).collect();
    config.clone().with_sigmas(sigmas).validate()?;

    let l = covariance
        .clone()
        .cholesky()
        .ok_or_else(|| {
            ImputeError::Configuration("covariance is not positive definite".to_string())
        })?
        .l();
    let mean = config
        .mean
        .as_ref()
        .map(|m| DVector::from_column_slice(m))
        .unwrap_or_else(|| DVector::zeros(dim));
    let transform = AlrTransform::new(n_parts, 0, 1.0)?;

    let mut truth = DMatrix::zeros(n_rows, n_parts);
    for i in 0..n_rows {
        let z = DVector::from_fn(dim, |_, _| rng.sample::<f64, _>(StandardNormal));
        let y = &mean + &l * z;
        truth.row_mut(i).copy_from(&transform.inverse(&y).transpose());
    }

    let missing = inject_missing(&truth, config, rng);
    let mut values = truth.clone();
    for (v, &m) in values.iter_mut().zip(missing.iter()) {
        if m {
            *v = f64::NAN;
        }
    }

    let part_ids = (0..n_parts).map(|j| format!("x{}", j)).collect();
    let sample_ids = (0..n_rows).map(|i| format!("S{:04}", i)).collect();
    let data = CompositionMatrix::new(values, part_ids, sample_ids)?;

    Ok(SyntheticComposition {
        data,
        truth,
        missing,
        covariance,
        config: config.clone(),
    })
}

/// Generate synthetic data from the config's seed.
pub fn generate_synthetic(config: &SyntheticConfig) -> Result<SyntheticComposition> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    random_composition(config, &mut rng)
}

fn inject_missing<R: Rng>(truth: &DMatrix<f64>, config: &SyntheticConfig, rng: &mut R) -> DMatrix<bool> {
    let n_rows = truth.nrows();
    let n_missing = (config.proportion_missing * n_rows as f64).round() as usize;
    let mut mask = DMatrix::from_element(n_rows, truth.ncols(), false);

    let driver = (0..truth.ncols())
        .find(|p| !config.missing_parts.contains(p))
        .unwrap_or(0);

    for &j in &config.missing_parts {
        let rows = match config.mechanism {
            MissingMechanism::Mcar => {
                let mut rows: Vec<usize> = (0..n_rows).collect();
                rows.shuffle(rng);
                rows.truncate(n_missing);
                rows
            }
            MissingMechanism::Mar => lowest_rows(truth, driver, n_missing),
            MissingMechanism::Mnar => lowest_rows(truth, j, n_missing),
        };
        for i in rows {
            mask[(i, j)] = true;
        }
    }
    mask
}

/// Indices of the `k` rows with the smallest values in `part`.
fn lowest_rows(truth: &DMatrix<f64>, part: usize, k: usize) -> Vec<usize> {
    let column = truth.column(part);
    let mut rows: Vec<usize> = (0..truth.nrows()).collect();
    rows.sort_by(|&a, &b| column[a].total_cmp(&column[b]));
    rows.truncate(k);
    rows
}
