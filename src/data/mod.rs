//! Composition data container and TSV I/O.

mod composition;

pub use composition::CompositionMatrix;
