// Normalization module
// Maps raw attribute values into the unit interval

pub mod normalizer;

pub use normalizer::{normalize, Normalizer, Processor};
