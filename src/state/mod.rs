// State management module
// Handles SQLite persistence and file system operations

pub mod db;
pub mod models;
pub mod queries;
pub mod storage;
pub mod store;

pub use db::{init_db, DbConnection, DbError, DbResult};
pub use models::{ColumnDef, Flight, FlightSummary, ParamType};
pub use queries::{
    delete_flight, discard_staged_flight, get_column_definitions, get_flight, insert_rows,
    list_events, list_flights, read_series, register_flight, save_events, stage_flight,
};
pub use store::{AttributeStore, MemoryStore};
