// Series data model
// Time-stamped sample points, per-attribute statistics and series buffers

pub mod stats;
pub mod types;

pub use stats::{AttributeMetadata, MetadataAccumulator};
pub use types::{
    hours_to_ticks, ConversionError, SamplePoint, SeriesBuffer, SeriesBuilder, TICKS_PER_HOUR,
    TICKS_PER_SECOND,
};
