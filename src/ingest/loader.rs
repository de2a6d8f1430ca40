// CSV flight log loader
// A parser task and a single writer task joined by a bounded channel

use rusqlite::types::Value;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::IngestConfig;
use crate::ingest::columns::build_columns;
use crate::pipeline::{Stage, TraceBuilder, TraceWriter};
use crate::state::storage::{self, StorageError};
use crate::state::{self, ColumnDef, DbConnection, DbError, Flight, ParamType};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0} has no header row")]
    MissingHeader(String),

    #[error("{0} has no data rows")]
    NoData(String),

    #[error("Header has {header} columns but the first data row has {data}")]
    WidthMismatch { header: usize, data: usize },

    #[error("Delimiter {0:?} is not a single byte")]
    InvalidDelimiter(char),

    #[error("Loader task failed: {0}")]
    Task(String),
}

pub type IngestResult<T> = Result<T, IngestError>;

/// Outcome of loading one CSV file
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub flight: Flight,
    pub rows_written: u64,

    /// Rows holding at least one NULL (empty, missing or non-numeric field)
    pub rows_with_nulls: u64,

    pub columns: Vec<ColumnDef>,

    /// Raw names of columns that were not stored
    pub skipped_columns: Vec<String>,
}

/// Rows of values for the good columns, in header order
type Batch = Vec<Vec<Value>>;

#[derive(Debug, Default)]
struct ParseStats {
    rows: u64,
    rows_with_nulls: u64,
}

fn join_error(e: tokio::task::JoinError) -> IngestError {
    IngestError::Task(e.to_string())
}

fn open_reader(path: &Path, delimiter: u8) -> IngestResult<csv::Reader<File>> {
    let reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    Ok(reader)
}

/// Column definitions from the header and the first data row
fn read_columns(path: &Path, delimiter: u8) -> IngestResult<Vec<ColumnDef>> {
    let mut reader = open_reader(path, delimiter)?;
    let header = reader.headers()?.clone();
    if header.is_empty() {
        return Err(IngestError::MissingHeader(path.display().to_string()));
    }

    let mut sample = csv::StringRecord::new();
    if !reader.read_record(&mut sample)? {
        return Err(IngestError::NoData(path.display().to_string()));
    }
    if sample.len() != header.len() {
        return Err(IngestError::WidthMismatch {
            header: header.len(),
            data: sample.len(),
        });
    }

    Ok(build_columns(header.iter(), sample.iter()))
}

/// Convert one record into values for `columns`
/// Returns the values and whether any of them is NULL
fn convert_record(record: &csv::StringRecord, columns: &[&ColumnDef]) -> (Vec<Value>, bool) {
    let mut has_null = false;
    let mut values = Vec::with_capacity(columns.len());

    for column in columns {
        let value = match record.get(column.ordinal) {
            None | Some("") => Value::Null,
            Some(field) => match column.param_type {
                ParamType::Numeric => field.parse::<f64>().map(Value::Real).unwrap_or(Value::Null),
                ParamType::Text => Value::Text(field.to_string()),
            },
        };
        has_null |= value == Value::Null;
        values.push(value);
    }

    (values, has_null)
}

/// Emits evenly spaced progress entries as bytes are read
struct Progress {
    trace: TraceWriter,
    flight: String,
    total_bytes: u64,
    step: u64,
    next: u64,
}

impl Progress {
    fn new(trace: TraceWriter, flight: String, total_bytes: u64, increments: u32) -> Self {
        let step = (total_bytes / u64::from(increments.max(1))).max(1);
        Progress {
            trace,
            flight,
            total_bytes,
            step,
            next: step,
        }
    }

    fn update(&mut self, bytes_read: u64) {
        if bytes_read < self.next {
            return;
        }
        let fraction = bytes_read as f32 / self.total_bytes.max(1) as f32;
        self.trace.record(&TraceBuilder::stage(Stage::Ingest, &self.flight).progress(
            fraction,
            format!("{} of {} bytes read", bytes_read, self.total_bytes),
        ));
        self.next = (bytes_read / self.step + 1) * self.step;
    }
}

/// Parser side: read records, convert them and queue full batches
fn parse_rows(
    path: PathBuf,
    delimiter: u8,
    columns: Vec<ColumnDef>,
    batch_size: usize,
    mut progress: Option<Progress>,
    tx: mpsc::Sender<Batch>,
) -> IngestResult<ParseStats> {
    let mut reader = open_reader(&path, delimiter)?;
    let good: Vec<&ColumnDef> = columns.iter().filter(|c| c.good).collect();

    let mut stats = ParseStats::default();
    let mut record = csv::StringRecord::new();
    let mut batch: Batch = Vec::with_capacity(batch_size);

    while reader.read_record(&mut record)? {
        let (values, has_null) = convert_record(&record, &good);
        stats.rows += 1;
        if has_null {
            stats.rows_with_nulls += 1;
        }
        batch.push(values);

        if batch.len() >= batch_size {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
            tx.blocking_send(full)
                .map_err(|_| IngestError::Task("writer stopped early".to_string()))?;
        }

        if let Some(progress) = progress.as_mut() {
            progress.update(reader.position().byte());
        }
    }

    if !batch.is_empty() {
        tx.blocking_send(batch)
            .map_err(|_| IngestError::Task("writer stopped early".to_string()))?;
    }

    Ok(stats)
}

/// Writer side: drain batches, one transaction each, until the parser hangs up
fn write_batches(
    db: DbConnection,
    flight: Flight,
    columns: Vec<ColumnDef>,
    mut rx: mpsc::Receiver<Batch>,
) -> IngestResult<u64> {
    let mut written = 0u64;
    while let Some(batch) = rx.blocking_recv() {
        written += state::insert_rows(&db, &flight, &columns, &batch)? as u64;
        log::debug!("{}: {} rows written", flight.name, written);
    }
    Ok(written)
}

/// Run parser and writer to completion
/// Returns once the writer has drained the final batch
async fn transfer(
    db: &DbConnection,
    config: &IngestConfig,
    path: &Path,
    delimiter: u8,
    flight: &Flight,
    columns: &[ColumnDef],
    progress: Option<Progress>,
) -> IngestResult<(u64, ParseStats)> {
    let batch_size = config.batch_size.max(1);
    let (tx, rx) = mpsc::channel::<Batch>(config.queue_capacity.max(1));

    let writer = {
        let db = db.clone();
        let flight = flight.clone();
        let columns = columns.to_vec();
        tokio::task::spawn_blocking(move || write_batches(db, flight, columns, rx))
    };

    let parser = {
        let path = path.to_path_buf();
        let columns = columns.to_vec();
        tokio::task::spawn_blocking(move || {
            parse_rows(path, delimiter, columns, batch_size, progress, tx)
        })
    };

    let written = writer.await.map_err(join_error)?;
    let parsed = parser.await.map_err(join_error)?;

    // A writer failure also stops the parser, so report it first
    let rows_written = written?;
    let stats = parsed?;
    Ok((rows_written, stats))
}

/// Load a CSV flight log into the store under `name`
///
/// The first row names the columns and the second row decides their types.
/// Rows go into a fresh table that replaces an existing flight of the same
/// name only once every row is written. On failure the previous flight is
/// left as it was.
pub async fn load_csv(
    db: &DbConnection,
    config: &IngestConfig,
    path: &Path,
    name: &str,
    trace: Option<TraceWriter>,
) -> IngestResult<LoadSummary> {
    let delimiter =
        u8::try_from(config.delimiter).map_err(|_| IngestError::InvalidDelimiter(config.delimiter))?;

    let (columns, sha256, total_bytes) = {
        let source = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> IngestResult<_> {
            let columns = read_columns(&source, delimiter)?;
            let sha256 = storage::hash_file(&source)?;
            let total_bytes = std::fs::metadata(&source)?.len();
            Ok((columns, sha256, total_bytes))
        })
        .await
        .map_err(join_error)??
    };

    let mut flight = state::stage_flight(
        db,
        name,
        path.to_string_lossy().to_string(),
        sha256,
        &columns,
    )?;
    log::info!(
        "Loading {} into {} ({} columns)",
        path.display(),
        flight.table_name,
        columns.len()
    );

    let progress = trace.as_ref().map(|writer| {
        writer.record(
            &TraceBuilder::stage(Stage::Ingest, name).start(format!("Loading {}", path.display())),
        );
        Progress::new(writer.clone(), name.to_string(), total_bytes, config.progress_increments)
    });

    let result = transfer(db, config, path, delimiter, &flight, &columns, progress).await;
    let transferred = match result {
        Ok((rows_written, stats)) => {
            flight.row_count = rows_written as i64;
            state::register_flight(db, &flight, &columns)
                .map(|()| (rows_written, stats))
                .map_err(IngestError::from)
        }
        Err(e) => Err(e),
    };

    let (rows_written, stats) = match transferred {
        Ok(result) => result,
        Err(e) => {
            log::error!("Loading {} failed: {}", name, e);
            if let Err(cleanup) = state::discard_staged_flight(db, &flight) {
                log::warn!("Failed to remove staged table {}: {}", flight.table_name, cleanup);
            }
            return Err(e);
        }
    };

    let skipped_columns: Vec<String> = columns
        .iter()
        .filter(|c| !c.good)
        .map(|c| c.raw_name.clone())
        .collect();

    log::info!(
        "Loaded {}: {} of {} rows written, {} with NULLs, {} columns skipped",
        name,
        rows_written,
        stats.rows,
        stats.rows_with_nulls,
        skipped_columns.len()
    );

    if let Some(writer) = trace.as_ref() {
        writer.record(&TraceBuilder::stage(Stage::Ingest, name).complete(
            format!("Loaded {} rows", rows_written),
            serde_json::json!({
                "rows_written": rows_written,
                "rows_with_nulls": stats.rows_with_nulls,
                "skipped_columns": skipped_columns,
            }),
        ));
    }

    Ok(LoadSummary {
        flight,
        rows_written,
        rows_with_nulls: stats.rows_with_nulls,
        columns,
        skipped_columns,
    })
}
