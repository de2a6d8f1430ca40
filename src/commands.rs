// Host commands
// Entry points shared by host UIs and the CLI
use serde::Serialize;
use std::path::Path;

use crate::config::AppConfig;
use crate::events::{
    DetectorThresholds, EventDefinitions, EventSet, EventTimeline, ReferenceBand,
};
use crate::ingest::{self, LoadSummary};
use crate::normalize::{Normalizer, Processor};
use crate::pipeline::{Stage, TraceBuilder, TraceWriter};
use crate::selection::{AttributeSelection, MIN_CHART_ATTRIBUTES};
use crate::series::SeriesBuffer;
use crate::state::{self, AttributeStore, ColumnDef, DbConnection, Flight, FlightSummary};

#[derive(Debug, Serialize)]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl<E: std::fmt::Display> From<E> for CommandError {
    fn from(error: E) -> Self {
        CommandError {
            message: error.to_string(),
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

fn flight_not_found(name: &str) -> CommandError {
    CommandError {
        message: format!("Flight not found: {}", name),
    }
}

fn require_flight(db: &DbConnection, name: &str) -> CommandResult<Flight> {
    state::get_flight(db, name)?.ok_or_else(|| flight_not_found(name))
}

/// Trace writer for the configured trace directory, if any
fn trace_writer(config: &AppConfig) -> Option<TraceWriter> {
    let dir = config.storage.trace_dir.as_deref()?;
    match std::fs::create_dir_all(dir) {
        Ok(()) => Some(TraceWriter::in_dir(dir)),
        Err(e) => {
            log::warn!("Tracing disabled, cannot create {}: {}", dir.display(), e);
            None
        }
    }
}

// ==================== FLIGHT COMMANDS ====================

/// Load a CSV log; the flight is named after the file stem unless `name` is given
pub async fn load_flight(
    db: &DbConnection,
    config: &AppConfig,
    path: &Path,
    name: Option<&str>,
) -> CommandResult<LoadSummary> {
    let name = match name {
        Some(n) => n.to_string(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| CommandError {
                message: format!("Cannot derive a flight name from {}", path.display()),
            })?,
    };

    let summary =
        ingest::load_csv(db, &config.ingest, path, &name, trace_writer(config)).await?;
    Ok(summary)
}

pub fn list_flights(db: &DbConnection) -> CommandResult<Vec<FlightSummary>> {
    Ok(state::list_flights(db)?)
}

pub fn get_flight_columns(db: &DbConnection, flight: &str) -> CommandResult<Vec<ColumnDef>> {
    let flight = require_flight(db, flight)?;
    Ok(state::get_column_definitions(db, &flight.id)?)
}

pub fn delete_flight(db: &DbConnection, flight: &str) -> CommandResult<bool> {
    let deleted = state::delete_flight(db, flight)?;
    if deleted {
        log::info!("Deleted flight {}", flight);
    }
    Ok(deleted)
}

// ==================== SERIES COMMANDS ====================

pub fn get_series(
    db: &DbConnection,
    flight: &str,
    attributes: &[&str],
) -> CommandResult<SeriesBuffer> {
    Ok(db.get_data_attributes(flight, attributes)?)
}

/// Raw and normalized buffers for the same query
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedSeries {
    pub raw: SeriesBuffer,
    pub normalized: SeriesBuffer,
}

/// Series for charting; fewer than two attributes gives empty buffers
pub fn get_normalized_series(
    db: &DbConnection,
    config: &AppConfig,
    flight: &str,
    attributes: &[&str],
) -> CommandResult<NormalizedSeries> {
    let selection = AttributeSelection::from_names(attributes.iter().copied());
    let selected = selection.selected();

    if let Err(e) = selection.require_at_least(MIN_CHART_ATTRIBUTES) {
        log::warn!("{}: {}", flight, e);
        let empty = SeriesBuffer::empty(flight, &selected);
        return Ok(NormalizedSeries {
            raw: empty.clone(),
            normalized: empty,
        });
    }

    let raw = db.get_data_attributes(flight, &selected)?;
    let normalizer = Normalizer::new();
    let normalized = normalizer.process(&raw);

    if let Some(writer) = trace_writer(config) {
        writer.record(&TraceBuilder::stage(Stage::Normalize, flight).complete(
            format!("{} over {} points", normalizer.name(), raw.len()),
            serde_json::json!({
                "attributes": selected,
                "points": raw.len(),
                "conversion_errors": raw.conversion_errors().len(),
            }),
        ));
    }

    Ok(NormalizedSeries { raw, normalized })
}

// ==================== EVENT COMMANDS ====================

/// Detect the landing events of a flight and store them
pub fn detect_events(
    db: &DbConnection,
    config: &AppConfig,
    flight: &str,
) -> CommandResult<EventSet> {
    let record = require_flight(db, flight)?;
    let trace = trace_writer(config);

    if let Some(ref writer) = trace {
        writer.record(&TraceBuilder::stage(Stage::Detect, flight).start("Detecting events"));
    }

    let detector = config.detector();
    let events = detector.detect_flight(db, flight)?;
    state::save_events(db, &record.id, &events)?;

    if let Some(ref writer) = trace {
        let found: Vec<&str> = events.found().map(|e| e.name.as_str()).collect();
        writer.record(&TraceBuilder::stage(Stage::Detect, flight).complete(
            format!("Found {} of {} events", events.found_count(), events.len()),
            serde_json::json!({ "found": found }),
        ));
    }

    Ok(events)
}

/// Stored events of a flight; `None` until it has been analyzed
pub fn get_events(
    db: &DbConnection,
    config: &AppConfig,
    flight: &str,
) -> CommandResult<Option<EventSet>> {
    let record = require_flight(db, flight)?;
    Ok(state::list_events(db, &record, &config.definitions)?)
}

/// Stored events ordered by sequence rank, with deltas between them
pub fn get_event_timeline(
    db: &DbConnection,
    config: &AppConfig,
    flight: &str,
) -> CommandResult<Option<EventTimeline>> {
    let events = get_events(db, config, flight)?;
    Ok(events.as_ref().map(EventTimeline::from_events))
}

#[derive(Debug, Clone, Serialize)]
pub struct EventDefinitionsView {
    pub definitions: EventDefinitions,
    pub thresholds: DetectorThresholds,
    pub bands: Vec<ReferenceBand>,
}

/// Definitions, thresholds and reference bands on a display scale
/// The scale defaults to the value range spanned by all definitions
pub fn get_event_definitions(
    config: &AppConfig,
    scale: Option<(f64, f64)>,
) -> EventDefinitionsView {
    let (scale_min, scale_max) = scale.unwrap_or_else(|| config.definitions.value_range());
    EventDefinitionsView {
        definitions: config.definitions.clone(),
        thresholds: config.detector.clone(),
        bands: config.definitions.bands_on_scale(scale_min, scale_max),
    }
}
