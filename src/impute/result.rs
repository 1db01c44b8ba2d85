//! Result of an EMCOMP run.

use crate::censor::CensoringPattern;
use crate::data::CompositionMatrix;
use crate::moments::Moments;
use serde::{Deserialize, Serialize};

/// How the iteration ended. Both outcomes carry a usable imputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmStatus {
    /// The change metric fell below the tolerance.
    Converged,
    /// The iteration cap was reached first; the imputation is best-effort.
    MaxIterationsReached,
}

/// Imputed compositions plus estimation metadata.
#[derive(Debug, Clone)]
pub struct ImputeResult {
    /// Imputed matrix, same shape as the input. Unusable rows are returned
    /// unchanged.
    pub imputed: CompositionMatrix,
    /// Censoring labels used for the run.
    pub pattern: CensoringPattern,
    /// Row mask: true for rows whose censored cells were imputed.
    pub censored_rows: Vec<bool>,
    /// Proportion of rows that were imputed (`p0`).
    pub p0: f64,
    /// Number of EM iterations performed.
    pub iterations: usize,
    /// Termination status.
    pub status: EmStatus,
    /// Final mean/covariance estimate in ALR coordinates.
    pub moments: Moments,
    /// Index of the ALR reference part.
    pub reference_part: usize,
    /// Change metric after each iteration.
    pub history: Vec<f64>,
}

impl ImputeResult {
    /// True if the run converged within the iteration cap.
    pub fn converged(&self) -> bool {
        self.status == EmStatus::Converged
    }

    /// Serializable summary of the run.
    pub fn summary(&self) -> ImputeSummary {
        let dim = self.moments.dim();
        ImputeSummary {
            n_rows: self.pattern.n_rows(),
            n_parts: self.pattern.n_parts(),
            n_complete: self.pattern.n_complete(),
            n_censored: self.pattern.n_censored(),
            n_unusable: self.pattern.n_unusable(),
            n_imputed_cells: self.pattern.n_censored_cells(),
            p0: self.p0,
            iterations: self.iterations,
            status: self.status,
            final_change: self.history.last().copied(),
            reference_part: self.imputed.part_ids()[self.reference_part].clone(),
            mean: self.moments.mean.iter().copied().collect(),
            covariance: (0..dim)
                .map(|r| (0..dim).map(|c| self.moments.covariance[(r, c)]).collect())
                .collect(),
        }
    }
}

/// Flat summary of an [`ImputeResult`] for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImputeSummary {
    pub n_rows: usize,
    pub n_parts: usize,
    pub n_complete: usize,
    pub n_censored: usize,
    pub n_unusable: usize,
    pub n_imputed_cells: usize,
    pub p0: f64,
    pub iterations: usize,
    pub status: EmStatus,
    pub final_change: Option<f64>,
    pub reference_part: String,
    /// ALR mean.
    pub mean: Vec<f64>,
    /// ALR covariance, row-major.
    pub covariance: Vec<Vec<f64>>,
}

impl std::fmt::Display for ImputeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "EMCOMP Imputation")?;
        writeln!(f, "  Rows x parts:      {} x {}", self.n_rows, self.n_parts)?;
        writeln!(f, "  Complete rows:     {}", self.n_complete)?;
        writeln!(f, "  Censored rows:     {} (p0 = {:.3})", self.n_censored, self.p0)?;
        writeln!(f, "  Unusable rows:     {}", self.n_unusable)?;
        writeln!(f, "  Imputed cells:     {}", self.n_imputed_cells)?;
        writeln!(f, "  Reference part:    {}", self.reference_part)?;
        writeln!(f, "  Iterations:        {}", self.iterations)?;
        writeln!(f, "  Status:            {:?}", self.status)?;
        if let Some(change) = self.final_change {
            writeln!(f, "  Final change:      {:.3e}", change)?;
        }
        Ok(())
    }
}
