//! Synthetic compositional data for testing and benchmarking imputation.
//!
//! Datasets carry the complete compositions alongside the censored copy, so
//! imputed values can be compared with the values that were removed.

mod generate;

pub use generate::{
    generate_synthetic, random_composition, random_composition_with_cov, random_cov_matrix,
    MissingMechanism, SyntheticComposition, SyntheticConfig,
};
