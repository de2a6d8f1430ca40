// Glidepath - flight log attribute store, normalizer and landing event detector
// Module declarations

pub mod commands;
pub mod config;
pub mod events;
pub mod ingest;
pub mod normalize;
pub mod pipeline;
pub mod selection;
pub mod series;
pub mod state;

pub use config::AppConfig;
pub use events::{Event, EventDetector, EventKind, EventSet};
pub use normalize::{normalize, Normalizer, Processor};
pub use series::{AttributeMetadata, SamplePoint, SeriesBuffer};
pub use state::{AttributeStore, DbConnection, MemoryStore};
