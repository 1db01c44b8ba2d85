//! Composable EMCOMP Library
//!
//! This library imputes below-detection (censored) values in compositional
//! data with the EM-based EMCOMP algorithm: rows are mapped to additive
//! log-ratio coordinates, a multivariate normal is fitted by
//! expectation-maximization while each censored coordinate is replaced by its
//! conditional expectation truncated at the detection limit, and imputed cells
//! are mapped back to the composition.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Composition matrix and TSV I/O
//! - **censor**: Detection limits and row classification
//! - **transform**: ALR transform, reference part selection, closure
//! - **zero**: Placeholders for censored cells
//! - **moments**: Mean/covariance estimation and convergence metrics
//! - **estep**: Truncated conditional expectations (the E-step)
//! - **impute**: EMCOMP driver, configuration and results
//! - **profile**: Censoring profile of a dataset
//! - **benchmark**: Synthetic compositions with injected censoring
//!
//! # Example
//!
//! ```no_run
//! use composable_emcomp::prelude::*;
//!
//! // Load data; censored cells are NA, BDL, <0.01, ...
//! let data = CompositionMatrix::from_tsv("assays.tsv").unwrap();
//! let limits = DetectionLimits::from_percentile(data.matrix(), 10.0).unwrap();
//!
//! let config = EmcompConfig::default().with_tolerance(0.01);
//! let result = emcomp_with_config(&data, &limits, &config).unwrap();
//! println!("{}", result.summary());
//! ```

pub mod benchmark;
pub mod censor;
pub mod data;
pub mod error;
pub mod estep;
pub mod impute;
pub mod moments;
pub mod profile;
pub mod transform;
pub mod zero;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::benchmark::{
        generate_synthetic, random_composition, random_cov_matrix, MissingMechanism,
        SyntheticComposition, SyntheticConfig,
    };
    pub use crate::censor::{classify_rows, CensoringPattern, DetectionLimits, RowCategory};
    pub use crate::data::CompositionMatrix;
    pub use crate::error::{ImputeError, Result};
    pub use crate::impute::{
        emcomp, emcomp_dense, emcomp_with_config, Closure, EmStatus, EmcompConfig, ImputeResult,
        ImputeSummary,
    };
    pub use crate::moments::{ConvergenceMetric, Moments};
    pub use crate::profile::{profile_censoring, CensoringProfile, PartCensoring};
    pub use crate::transform::{AlrTransform, ReferencePart};
}
