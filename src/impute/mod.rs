//! EMCOMP imputation of below-detection values.

pub mod config;
pub mod emcomp;
pub mod result;

pub use config::{Closure, EmcompConfig};
pub use emcomp::{emcomp, emcomp_dense, emcomp_with_config};
pub use result::{EmStatus, ImputeResult, ImputeSummary};
