//! Data profiling for censored composition matrices.

mod censoring;

pub use censoring::{profile_censoring, CensoringProfile, PartCensoring};
