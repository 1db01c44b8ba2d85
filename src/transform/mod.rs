//! Log-ratio transformation and closure for compositional data.
//!
//! - **ALR**: additive log-ratio against a reference part, used for all
//!   estimation
//! - **Closure**: rescaling rows to a fixed total, including multiplicative
//!   replacement after imputation

pub mod alr;
pub mod closure;

pub use alr::{select_reference, AlrTransform, ReferencePart};
pub use closure::{close, close_multiplicative, infer_total};
