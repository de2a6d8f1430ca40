// Event detection module
// Landing-sequence events, their reference definitions and the detector

pub mod definitions;
pub mod detector;
pub mod timeline;
pub mod types;

pub use definitions::{EventDefinition, EventDefinitions, ReferenceBand};
pub use detector::{DetectorThresholds, EventDetector, DETECTION_ATTRIBUTES};
pub use timeline::{EventTimeline, TimelineEntry};
pub use types::{Event, EventKind, EventSet};
