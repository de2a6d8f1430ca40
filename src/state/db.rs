// SQLite database setup and migrations
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::storage::{default_db_path, StorageError};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Database initialization failed: {0}")]
    InitFailed(String),
    #[error("Invalid name: {0:?}")]
    InvalidName(String),
}

pub type DbResult<T> = Result<T, DbError>;

// Thread-safe database connection wrapper
pub struct DbConnection {
    conn: Arc<Mutex<Connection>>,
}

impl DbConnection {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Open (or create) a database file and bring its schema up to date
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::prepare(conn)
    }

    /// Private in-memory database, mostly for tests and previews
    pub fn open_in_memory() -> DbResult<Self> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> DbResult<Self> {
        // Enable foreign keys
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        run_migrations(&conn)?;

        Ok(DbConnection::new(conn))
    }

    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock leaves SQLite itself consistent
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clone for DbConnection {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

/// Initialize the database at `path`, or at the app data directory
pub fn init_db(path: Option<&Path>) -> DbResult<DbConnection> {
    let db_path = match path {
        Some(p) => p.to_path_buf(),
        None => default_db_path()?,
    };

    log::info!("Opening flight database at {}", db_path.display());
    DbConnection::open(&db_path)
}

fn run_migrations(conn: &Connection) -> DbResult<()> {
    // Create migrations table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Get current version
    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    // Apply migrations
    if current_version < 1 {
        migration_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (?1)", [1])?;
    }

    Ok(())
}

fn migration_v1(conn: &Connection) -> DbResult<()> {
    // Flight registry; sample rows live in one table per flight
    conn.execute(
        "CREATE TABLE IF NOT EXISTS flights (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            table_name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            source_path TEXT NOT NULL,
            source_sha256 TEXT NOT NULL,
            row_count INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_flights_created_at ON flights(created_at DESC)",
        [],
    )?;

    // Column definitions extracted from the CSV header
    conn.execute(
        "CREATE TABLE IF NOT EXISTS flight_columns (
            flight_id TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            raw_name TEXT NOT NULL,
            name TEXT NOT NULL,
            param_type TEXT NOT NULL,
            good INTEGER NOT NULL,
            PRIMARY KEY (flight_id, ordinal),
            FOREIGN KEY (flight_id) REFERENCES flights(id) ON DELETE CASCADE
        )",
        [],
    )?;

    // Detected landing events, six rows per analyzed flight
    conn.execute(
        "CREATE TABLE IF NOT EXISTS flight_events (
            flight_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            description TEXT NOT NULL,
            sequence_rank INTEGER NOT NULL,
            time INTEGER NOT NULL,
            raw_value REAL NOT NULL,
            normalized_value REAL NOT NULL,
            found INTEGER NOT NULL,
            detected_at TEXT NOT NULL,
            PRIMARY KEY (flight_id, kind),
            FOREIGN KEY (flight_id) REFERENCES flights(id) ON DELETE CASCADE
        )",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_db_init() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        // Verify tables exist
        let table_count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('flights', 'flight_columns', 'flight_events')",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(table_count, 3);
    }

    #[test]
    fn test_migrations_are_reentrant() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let versions: i32 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("flights.db");

        let db = DbConnection::open(&path).unwrap();
        drop(db);
        assert!(path.exists());
    }
}
