//! Row classification by censoring pattern.
//!
//! Every row is tagged as complete, censored (with the set of censored parts),
//! or unusable (all parts censored). Unusable rows carry no observed information
//! and are passed through the imputation untouched.

use crate::censor::limits::DetectionLimits;
use crate::error::{ImputeError, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Minimum number of parts for log-ratio imputation.
pub const MIN_PARTS: usize = 3;

/// Censoring category of a single row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowCategory {
    /// Every part observed.
    Complete,
    /// Some parts below detection; indices of the censored parts, ascending.
    Censored(Vec<usize>),
    /// Every part below detection.
    Unusable,
}

impl RowCategory {
    /// Censored part indices (empty for complete rows).
    pub fn censored_parts(&self) -> &[usize] {
        match self {
            RowCategory::Censored(parts) => parts,
            _ => &[],
        }
    }

    /// True if the row takes part in estimation.
    pub fn is_usable(&self) -> bool {
        !matches!(self, RowCategory::Unusable)
    }

    /// True if the row has censored parts to impute.
    pub fn is_censored(&self) -> bool {
        matches!(self, RowCategory::Censored(_))
    }
}

/// Censoring labels for a whole matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CensoringPattern {
    rows: Vec<RowCategory>,
    n_parts: usize,
}

impl CensoringPattern {
    /// Category of row `i`.
    pub fn category(&self, i: usize) -> &RowCategory {
        &self.rows[i]
    }

    /// All row categories, in row order.
    pub fn rows(&self) -> &[RowCategory] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_parts(&self) -> usize {
        self.n_parts
    }

    pub fn n_complete(&self) -> usize {
        self.rows.iter().filter(|r| matches!(r, RowCategory::Complete)).count()
    }

    pub fn n_censored(&self) -> usize {
        self.rows.iter().filter(|r| r.is_censored()).count()
    }

    pub fn n_unusable(&self) -> usize {
        self.rows.iter().filter(|r| !r.is_usable()).count()
    }

    /// Number of usable (complete or censored) rows.
    pub fn n_usable(&self) -> usize {
        self.rows.len() - self.n_unusable()
    }

    /// Total number of censored cells in usable rows.
    pub fn n_censored_cells(&self) -> usize {
        self.rows.iter().map(|r| r.censored_parts().len()).sum()
    }

    /// Row mask: true where the row has censored parts to impute.
    pub fn censored_mask(&self) -> Vec<bool> {
        self.rows.iter().map(|r| r.is_censored()).collect()
    }

    /// Row mask: true where the row takes part in estimation.
    pub fn usable_mask(&self) -> Vec<bool> {
        self.rows.iter().map(|r| r.is_usable()).collect()
    }

    /// Row mask: true where the row is complete.
    pub fn complete_mask(&self) -> Vec<bool> {
        self.rows
            .iter()
            .map(|r| matches!(r, RowCategory::Complete))
            .collect()
    }

    /// Proportion of all rows that carry censored parts.
    pub fn proportion_censored(&self) -> f64 {
        if self.rows.is_empty() {
            0.0
        } else {
            self.n_censored() as f64 / self.rows.len() as f64
        }
    }

    /// True if cell (row, part) was censored in a usable row.
    pub fn is_censored(&self, row: usize, part: usize) -> bool {
        self.rows[row].censored_parts().binary_search(&part).is_ok()
    }

    /// Parts that are observed in every usable row, ascending.
    pub fn fully_observed_parts(&self) -> Vec<usize> {
        let mut observed = vec![true; self.n_parts];
        for row in &self.rows {
            for &p in row.censored_parts() {
                observed[p] = false;
            }
        }
        (0..self.n_parts).filter(|&j| observed[j]).collect()
    }
}

/// True if a raw cell value is a censoring sentinel.
pub fn is_censored_value(value: f64, zeros_as_censored: bool) -> bool {
    value.is_nan() || (zeros_as_censored && value == 0.0)
}

/// Classify every row of `data` by its censoring pattern.
///
/// # Arguments
/// * `data` - Raw composition matrix (rows × parts), censored cells as `NaN`
/// * `limits` - Detection limit per part
/// * `zeros_as_censored` - Also treat exact zeros as below detection
///
/// # Errors
/// `Configuration` if there are fewer than 3 parts, the limit vector does not
/// match the number of parts, or a part with a zero limit has censored cells.
/// `InvalidValue` for negative, infinite, or (when zeros are not censored)
/// zero observed values.
pub fn classify_rows(
    data: &DMatrix<f64>,
    limits: &DetectionLimits,
    zeros_as_censored: bool,
) -> Result<CensoringPattern> {
    let (n_rows, n_parts) = data.shape();

    if n_parts < MIN_PARTS {
        return Err(ImputeError::Configuration(format!(
            "log-ratio imputation requires at least {} parts, got {}",
            MIN_PARTS, n_parts
        )));
    }
    limits.check_parts(n_parts)?;
    if n_rows == 0 {
        return Err(ImputeError::EmptyData("composition matrix has no rows".to_string()));
    }

    let mut rows = Vec::with_capacity(n_rows);
    let mut below_limit = 0usize;

    for i in 0..n_rows {
        let mut censored = Vec::new();
        for j in 0..n_parts {
            let value = data[(i, j)];
            if is_censored_value(value, zeros_as_censored) {
                if limits.get(j) == 0.0 {
                    return Err(ImputeError::Configuration(format!(
                        "row {} part {} is censored but its detection limit is zero",
                        i, j
                    )));
                }
                censored.push(j);
                continue;
            }
            if !value.is_finite() || value <= 0.0 {
                return Err(ImputeError::InvalidValue {
                    value: value.to_string(),
                    row: i,
                    col: j,
                });
            }
            if value < limits.get(j) {
                below_limit += 1;
            }
        }

        rows.push(match censored.len() {
            0 => RowCategory::Complete,
            k if k == n_parts => RowCategory::Unusable,
            _ => RowCategory::Censored(censored),
        });
    }

    if below_limit > 0 {
        log::warn!(
            "{} observed values lie below their detection limit; they are kept as observed",
            below_limit
        );
    }

    Ok(CensoringPattern { rows, n_parts })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAN: f64 = f64::NAN;

    fn limits() -> DetectionLimits {
        DetectionLimits::uniform(0.05, 4).unwrap()
    }

    #[test]
    fn test_categories() {
        let data = DMatrix::from_row_slice(
            3,
            4,
            &[
                0.4, 0.3, 0.2, 0.1, //
                0.5, NAN, 0.3, NAN, //
                NAN, NAN, NAN, NAN,
            ],
        );
        let pattern = classify_rows(&data, &limits(), true).unwrap();

        assert_eq!(pattern.category(0), &RowCategory::Complete);
        assert_eq!(pattern.category(1), &RowCategory::Censored(vec![1, 3]));
        assert_eq!(pattern.category(2), &RowCategory::Unusable);
        assert_eq!(pattern.n_complete(), 1);
        assert_eq!(pattern.n_censored(), 1);
        assert_eq!(pattern.n_unusable(), 1);
        assert_eq!(pattern.n_usable(), 2);
        assert_eq!(pattern.n_censored_cells(), 2);
        assert_eq!(pattern.censored_mask(), vec![false, true, false]);
        assert!(pattern.is_censored(1, 3));
        assert!(!pattern.is_censored(1, 2));
        // Unusable rows do not count against a part being fully observed
        assert_eq!(pattern.fully_observed_parts(), vec![0, 2]);
    }

    #[test]
    fn test_zeros_as_censored() {
        let data = DMatrix::from_row_slice(1, 4, &[0.5, 0.0, 0.3, 0.2]);
        let pattern = classify_rows(&data, &limits(), true).unwrap();
        assert_eq!(pattern.category(0), &RowCategory::Censored(vec![1]));

        let err = classify_rows(&data, &limits(), false).unwrap_err();
        assert!(matches!(err, ImputeError::InvalidValue { row: 0, col: 1, .. }));
    }

    #[test]
    fn test_rejects_two_parts() {
        let data = DMatrix::from_row_slice(1, 2, &[0.5, 0.5]);
        let limits = DetectionLimits::uniform(0.05, 2).unwrap();
        let err = classify_rows(&data, &limits, true).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_rejects_mismatched_limits() {
        let data = DMatrix::from_row_slice(1, 4, &[0.4, 0.3, 0.2, 0.1]);
        let limits = DetectionLimits::uniform(0.05, 3).unwrap();
        assert!(classify_rows(&data, &limits, true).unwrap_err().is_configuration());
    }

    #[test]
    fn test_rejects_censored_with_zero_limit() {
        let data = DMatrix::from_row_slice(1, 3, &[0.5, NAN, 0.5]);
        let limits = DetectionLimits::new(vec![0.1, 0.0, 0.1]).unwrap();
        assert!(classify_rows(&data, &limits, true).unwrap_err().is_configuration());
    }

    #[test]
    fn test_rejects_negative_value() {
        let data = DMatrix::from_row_slice(1, 3, &[0.5, -0.1, 0.6]);
        let limits = DetectionLimits::uniform(0.01, 3).unwrap();
        assert!(classify_rows(&data, &limits, true).is_err());
    }

    #[test]
    fn test_proportion_censored() {
        let data = DMatrix::from_row_slice(
            4,
            3,
            &[
                0.5, 0.3, 0.2, //
                0.5, NAN, 0.2, //
                0.6, 0.2, 0.2, //
                0.7, 0.2, 0.1,
            ],
        );
        let limits = DetectionLimits::uniform(0.05, 3).unwrap();
        let pattern = classify_rows(&data, &limits, true).unwrap();
        assert!((pattern.proportion_censored() - 0.25).abs() < 1e-12);
    }
}
