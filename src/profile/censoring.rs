//! Censoring profile for composition matrices.

use crate::censor::{classify_rows, DetectionLimits};
use crate::data::CompositionMatrix;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Censoring statistics for a single part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartCensoring {
    /// Part identifier.
    pub part_id: String,
    /// Detection limit used for this part.
    pub limit: f64,
    /// Number of censored cells in usable rows.
    pub censored: usize,
    /// Censored cells as a proportion of usable rows.
    pub proportion: f64,
}

/// Profile of the censoring pattern in a composition matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CensoringProfile {
    /// Total number of rows.
    pub n_rows: usize,
    /// Number of parts.
    pub n_parts: usize,
    /// Rows with every part observed.
    pub n_complete: usize,
    /// Rows with at least one (but not every) part censored.
    pub n_censored: usize,
    /// Rows with every part censored.
    pub n_unusable: usize,
    /// Total censored cells in usable rows.
    pub n_censored_cells: usize,
    /// Proportion of rows with censored parts.
    pub p0: f64,
    /// Per-part breakdown.
    pub parts: Vec<PartCensoring>,
    /// Parts observed in every usable row (candidate ALR references).
    pub fully_observed: Vec<String>,
}

impl CensoringProfile {
    /// Proportion of censored cells among all usable cells.
    pub fn cell_proportion(&self) -> f64 {
        let usable_cells = (self.n_rows - self.n_unusable) * self.n_parts;
        if usable_cells == 0 {
            0.0
        } else {
            self.n_censored_cells as f64 / usable_cells as f64
        }
    }

    /// True if no part can serve as the ALR reference.
    pub fn lacks_reference(&self) -> bool {
        self.fully_observed.is_empty()
    }
}

impl std::fmt::Display for CensoringProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Censoring Profile")?;
        writeln!(f, "  Rows x parts:      {} x {}", self.n_rows, self.n_parts)?;
        writeln!(f, "  Complete rows:     {}", self.n_complete)?;
        writeln!(f, "  Censored rows:     {}", self.n_censored)?;
        writeln!(f, "  Unusable rows:     {}", self.n_unusable)?;
        writeln!(f, "  Censored cells:    {} ({:.2}%)", self.n_censored_cells, self.cell_proportion() * 100.0)?;
        writeln!(f, "  p0:                {:.4}", self.p0)?;
        writeln!(f, "  Per part:")?;
        for part in &self.parts {
            writeln!(
                f,
                "    {:<12} limit {:<10.4e} censored {:>6} ({:.2}%)",
                part.part_id,
                part.limit,
                part.censored,
                part.proportion * 100.0
            )?;
        }
        if self.lacks_reference() {
            writeln!(f, "  No part is observed in every usable row")?;
        } else {
            writeln!(f, "  Fully observed:    {}", self.fully_observed.join(", "))?;
        }
        Ok(())
    }
}

/// Profile the censoring pattern of a composition matrix.
///
/// Uses the same row classification as the imputation, so any input the
/// imputation would reject up front is rejected here too.
pub fn profile_censoring(
    matrix: &CompositionMatrix,
    limits: &DetectionLimits,
    zeros_as_censored: bool,
) -> Result<CensoringProfile> {
    let pattern = classify_rows(matrix.matrix(), limits, zeros_as_censored)?;
    let n_parts = pattern.n_parts();
    let n_usable = pattern.n_usable();

    let mut counts = vec![0usize; n_parts];
    for row in pattern.rows() {
        for &j in row.censored_parts() {
            counts[j] += 1;
        }
    }

    let parts = counts
        .iter()
        .enumerate()
        .map(|(j, &censored)| PartCensoring {
            part_id: matrix.part_ids()[j].clone(),
            limit: limits.get(j),
            censored,
            proportion: if n_usable == 0 {
                0.0
            } else {
                censored as f64 / n_usable as f64
            },
        })
        .collect();

    let fully_observed = pattern
        .fully_observed_parts()
        .into_iter()
        .map(|j| matrix.part_ids()[j].clone())
        .collect();

    Ok(CensoringProfile {
        n_rows: pattern.n_rows(),
        n_parts,
        n_complete: pattern.n_complete(),
        n_censored: pattern.n_censored(),
        n_unusable: pattern.n_unusable(),
        n_censored_cells: pattern.n_censored_cells(),
        p0: pattern.proportion_censored(),
        parts,
        fully_observed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    const NAN: f64 = f64::NAN;

    fn create_test_matrix() -> CompositionMatrix {
        // 4 rows x 3 parts: one complete, two censored, one unusable
        let data = DMatrix::from_row_slice(
            4,
            3,
            &[
                0.5, 0.3, 0.2, //
                0.6, 0.4, NAN, //
                0.7, 0.0, NAN, //
                NAN, NAN, NAN,
            ],
        );
        CompositionMatrix::from_matrix(data)
    }

    #[test]
    fn test_profile_censoring() {
        let matrix = create_test_matrix();
        let limits = DetectionLimits::uniform(0.05, 3).unwrap();
        let profile = profile_censoring(&matrix, &limits, true).unwrap();

        assert_eq!(profile.n_rows, 4);
        assert_eq!(profile.n_complete, 1);
        assert_eq!(profile.n_censored, 2);
        assert_eq!(profile.n_unusable, 1);
        assert_eq!(profile.n_censored_cells, 3);
        assert_relative_eq!(profile.p0, 0.5);
        // 3 censored cells out of 3 usable rows x 3 parts
        assert_relative_eq!(profile.cell_proportion(), 3.0 / 9.0);
        assert_eq!(profile.fully_observed, vec!["P0".to_string()]);
    }

    #[test]
    fn test_part_breakdown() {
        let matrix = create_test_matrix();
        let limits = DetectionLimits::new(vec![0.01, 0.02, 0.03]).unwrap();
        let profile = profile_censoring(&matrix, &limits, true).unwrap();

        assert_eq!(profile.parts[0].censored, 0);
        assert_eq!(profile.parts[1].censored, 1);
        assert_eq!(profile.parts[2].censored, 2);
        assert_relative_eq!(profile.parts[2].proportion, 2.0 / 3.0);
        assert_relative_eq!(profile.parts[1].limit, 0.02);
    }

    #[test]
    fn test_zero_is_observed_when_disabled() {
        let matrix = create_test_matrix();
        let limits = DetectionLimits::uniform(0.05, 3).unwrap();
        // A literal zero is not a valid observation
        let err = profile_censoring(&matrix, &limits, false).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_display_mentions_missing_reference() {
        let data = DMatrix::from_row_slice(2, 3, &[NAN, 0.5, 0.5, 0.5, NAN, NAN]);
        let matrix = CompositionMatrix::from_matrix(data);
        let limits = DetectionLimits::uniform(0.05, 3).unwrap();
        let profile = profile_censoring(&matrix, &limits, true).unwrap();

        assert!(profile.lacks_reference());
        assert!(profile.to_string().contains("No part is observed"));
    }
}
