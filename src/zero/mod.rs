//! Handling of censored cells before log-ratio transformation.

pub mod placeholder;

pub use placeholder::seed_placeholders;
