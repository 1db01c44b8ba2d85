//! Detection limits and censoring classification.

pub mod classify;
pub mod limits;

pub use classify::{classify_rows, is_censored_value, CensoringPattern, RowCategory, MIN_PARTS};
pub use limits::DetectionLimits;
