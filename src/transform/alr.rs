//! Additive Log-Ratio (ALR) transformation anchored on a reference part.
//!
//! A composition `x` with D parts maps to the D-1 coordinates
//! `y_k = ln(x_j / x_ref)` for every part `j != ref`, in part order. The
//! inverse exponentiates, appends the reference (coordinate 0) and closes the
//! result to the fixed total.
//!
//! Because every coordinate is a ratio against the reference part, a detection
//! limit `t_j` on part `j` becomes the row-specific upper bound
//! `ln(t_j / x_ref)` in ALR space. The reference part must therefore be observed
//! in every row that is imputed.

use crate::censor::CensoringPattern;
use crate::error::{ImputeError, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Strategy for choosing the ALR reference (divisor) part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferencePart {
    /// Lowest-index part that is observed in every usable row.
    #[default]
    Auto,
    /// A specific part; must be observed in every usable row.
    Index(usize),
}

/// Stateless ALR mapping between the simplex and R^(D-1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlrTransform {
    n_parts: usize,
    reference: usize,
    total: f64,
}

impl AlrTransform {
    /// Create a transform over `n_parts` parts, dividing by part `reference`,
    /// closing inverse results to `total`.
    pub fn new(n_parts: usize, reference: usize, total: f64) -> Result<Self> {
        if n_parts < 2 {
            return Err(ImputeError::Configuration(
                "ALR requires at least 2 parts".to_string(),
            ));
        }
        if reference >= n_parts {
            return Err(ImputeError::Configuration(format!(
                "reference part {} out of bounds (n_parts = {})",
                reference, n_parts
            )));
        }
        if !total.is_finite() || total <= 0.0 {
            return Err(ImputeError::Configuration(format!(
                "closure total must be positive, got {}",
                total
            )));
        }
        Ok(Self {
            n_parts,
            reference,
            total,
        })
    }

    /// Number of parts D.
    pub fn n_parts(&self) -> usize {
        self.n_parts
    }

    /// Dimension of log-ratio space (D - 1).
    pub fn dim(&self) -> usize {
        self.n_parts - 1
    }

    /// Index of the reference part.
    pub fn reference(&self) -> usize {
        self.reference
    }

    /// Closure total used by [`inverse`](Self::inverse).
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Log-ratio coordinate of a part (`None` for the reference).
    pub fn coordinate(&self, part: usize) -> Option<usize> {
        use std::cmp::Ordering;
        match part.cmp(&self.reference) {
            Ordering::Less => Some(part),
            Ordering::Equal => None,
            Ordering::Greater => Some(part - 1),
        }
    }

    /// Part index of a log-ratio coordinate.
    pub fn part(&self, coordinate: usize) -> usize {
        if coordinate < self.reference {
            coordinate
        } else {
            coordinate + 1
        }
    }

    /// Map a composition row to ALR coordinates.
    ///
    /// Every part must be strictly positive and finite.
    pub fn forward(&self, row: &[f64]) -> Result<DVector<f64>> {
        if row.len() != self.n_parts {
            return Err(ImputeError::Configuration(format!(
                "row has {} parts, transform expects {}",
                row.len(),
                self.n_parts
            )));
        }
        if let Some((j, v)) = row
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v <= 0.0)
        {
            return Err(ImputeError::Configuration(format!(
                "ALR requires strictly positive parts; found {} in part {}",
                v, j
            )));
        }

        let log_ref = row[self.reference].ln();
        Ok(DVector::from_iterator(
            self.dim(),
            (0..self.n_parts)
                .filter(|&j| j != self.reference)
                .map(|j| row[j].ln() - log_ref),
        ))
    }

    /// Map ALR coordinates back to a composition closed to the fixed total.
    ///
    /// The largest part absorbs the rounding residual so the parts sum to the
    /// total exactly.
    pub fn inverse(&self, y: &DVector<f64>) -> DVector<f64> {
        debug_assert_eq!(y.len(), self.dim());
        // Shift by the largest log-ratio (reference counts as 0) to keep exp in range
        let shift = y.iter().copied().fold(0.0_f64, f64::max);
        let mut parts = self.expand(y, |v| (v - shift).exp(), (-shift).exp());

        let sum: f64 = parts.iter().sum();
        parts *= self.total / sum;

        let residual = self.total - parts.iter().sum::<f64>();
        let largest = parts.imax();
        parts[largest] += residual;
        parts
    }

    /// Map ALR coordinates back to parts scaled so the reference part equals
    /// `anchor`. Used to express imputed cells in the units of the input row.
    pub fn inverse_anchored(&self, y: &DVector<f64>, anchor: f64) -> DVector<f64> {
        debug_assert_eq!(y.len(), self.dim());
        self.expand(y, |v| anchor * v.exp(), anchor)
    }

    /// ALR-space upper bound of a part whose value is below `limit`, given the
    /// observed reference value of the same row.
    pub fn bound(&self, limit: f64, reference_value: f64) -> f64 {
        (limit / reference_value).ln()
    }

    /// Forward-transform the rows selected by `mask`. Unselected rows are left
    /// at zero.
    pub fn forward_rows(&self, data: &DMatrix<f64>, mask: &[bool]) -> Result<DMatrix<f64>> {
        let mut out = DMatrix::zeros(data.nrows(), self.dim());
        for i in (0..data.nrows()).filter(|&i| mask[i]) {
            let row: Vec<f64> = data.row(i).iter().copied().collect();
            let y = self.forward(&row)?;
            out.row_mut(i).copy_from(&y.transpose());
        }
        Ok(out)
    }

    fn expand(&self, y: &DVector<f64>, f: impl Fn(f64) -> f64, reference: f64) -> DVector<f64> {
        DVector::from_iterator(
            self.n_parts,
            (0..self.n_parts).map(|j| match self.coordinate(j) {
                Some(k) => f(y[k]),
                None => reference,
            }),
        )
    }
}

/// Resolve the reference part for a censoring pattern.
///
/// The reference must be observed in every usable row, otherwise the ALR
/// coordinates of that row cannot be formed.
pub fn select_reference(pattern: &CensoringPattern, reference: ReferencePart) -> Result<usize> {
    let candidates = pattern.fully_observed_parts();

    match reference {
        ReferencePart::Index(idx) => {
            if idx >= pattern.n_parts() {
                return Err(ImputeError::Configuration(format!(
                    "reference part {} out of bounds (n_parts = {})",
                    idx,
                    pattern.n_parts()
                )));
            }
            if !candidates.contains(&idx) {
                return Err(ImputeError::Configuration(format!(
                    "reference part {} is censored in at least one usable row",
                    idx
                )));
            }
            Ok(idx)
        }
        ReferencePart::Auto => candidates.first().copied().ok_or_else(|| {
            ImputeError::Configuration(
                "no part is observed in every usable row; cannot anchor the log-ratio transform"
                    .to_string(),
            )
        }),
    }
}
