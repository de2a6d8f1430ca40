// Running attribute statistics
// Accumulates min/max/sum/count while rows are read from the store

use serde::{Deserialize, Serialize};

/// Statistics for one attribute column of a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMetadata {
    /// Attribute (column) name as requested from the store
    pub name: String,

    /// Smallest value seen, 0.0 when no value was folded
    pub min: f64,

    /// Largest value seen, 0.0 when no value was folded
    pub max: f64,

    /// Sum of every folded value
    pub sum: f64,

    /// Number of folded values
    pub count: u64,
}

impl AttributeMetadata {
    /// Metadata for an attribute that has no samples
    pub fn empty(name: impl Into<String>) -> Self {
        AttributeMetadata {
            name: name.into(),
            min: 0.0,
            max: 0.0,
            sum: 0.0,
            count: 0,
        }
    }

    pub fn has_samples(&self) -> bool {
        self.count > 0
    }

    /// `max - min`, only meaningful once at least one value was folded
    pub fn range(&self) -> Option<f64> {
        self.has_samples().then(|| self.max - self.min)
    }

    /// `sum / count`, only meaningful once at least one value was folded
    pub fn avg(&self) -> Option<f64> {
        self.has_samples().then(|| self.sum / self.count as f64)
    }
}

/// Accumulator owned by a single query
/// Produces immutable `AttributeMetadata` once the scan is finished
#[derive(Debug, Clone)]
pub struct MetadataAccumulator {
    name: String,
    min: f64,
    max: f64,
    sum: f64,
    count: u64,
}

impl MetadataAccumulator {
    pub fn new(name: impl Into<String>) -> Self {
        MetadataAccumulator {
            name: name.into(),
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            count: 0,
        }
    }

    /// Fold one value into the running statistics
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn finish(self) -> AttributeMetadata {
        if self.count == 0 {
            return AttributeMetadata::empty(self.name);
        }

        AttributeMetadata {
            name: self.name,
            min: self.min,
            max: self.max,
            sum: self.sum,
            count: self.count,
        }
    }

    /// Build metadata from a fixed list of values
    pub fn from_values(name: impl Into<String>, values: &[f64]) -> AttributeMetadata {
        let mut acc = MetadataAccumulator::new(name);
        for value in values {
            acc.push(*value);
        }
        acc.finish()
    }
}
