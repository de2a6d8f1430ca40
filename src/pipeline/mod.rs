// Pipeline monitoring module
// Traces the ingest, normalize and detect stages of each flight

pub mod trace;

pub use trace::{read_trace_file, Stage, TraceBuilder, TraceEntry, TraceError, TraceWriter};
