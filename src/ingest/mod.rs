// Ingest module
// Loads flight recorder CSV logs into the attribute store

pub mod columns;
pub mod loader;

pub use columns::{build_columns, infer_param_type, normalize_column_name};
pub use loader::{load_csv, IngestError, IngestResult, LoadSummary};
