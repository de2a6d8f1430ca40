// Database CRUD operations
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value, ValueRef};
use rusqlite::{params, params_from_iter, OptionalExtension};
use uuid::Uuid;

use super::db::{DbConnection, DbError, DbResult};
use super::models::{ColumnDef, Flight, FlightSummary, ParamType};
use crate::events::{Event, EventDefinitions, EventKind, EventSet};
use crate::series::{SeriesBuffer, SeriesBuilder};

// ==================== NAMING ====================

/// Data table name for a flight, unique per load
pub fn table_name_for(flight_id: &Uuid) -> String {
    format!("flight_{}", flight_id.simple())
}

/// Quote a column or table identifier for SQLite
fn quote_ident(name: &str) -> DbResult<String> {
    if name.is_empty() || name.contains('"') {
        return Err(DbError::InvalidName(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

fn parse_uuid(idx: usize, s: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(idx: usize, s: String) -> rusqlite::Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ==================== FLIGHT QUERIES ====================

/// Create the data table of a new flight without registering it
///
/// The flight stays invisible to readers until `register_flight`; a flight
/// already registered under `name` is untouched until then.
pub fn stage_flight(
    db: &DbConnection,
    name: &str,
    source_path: String,
    source_sha256: String,
    columns: &[ColumnDef],
) -> DbResult<Flight> {
    if name.trim().is_empty() {
        return Err(DbError::InvalidName(name.to_string()));
    }

    let good: Vec<&ColumnDef> = columns.iter().filter(|c| c.good).collect();
    if good.is_empty() {
        return Err(DbError::InvalidName(format!("{} has no usable columns", name)));
    }

    let id = Uuid::new_v4();
    let flight = Flight {
        id,
        name: name.to_string(),
        table_name: table_name_for(&id),
        created_at: Utc::now(),
        source_path,
        source_sha256,
        row_count: 0,
    };

    let mut create_sql = format!(
        "CREATE TABLE {} (ID INTEGER PRIMARY KEY AUTOINCREMENT",
        quote_ident(&flight.table_name)?
    );
    for column in &good {
        create_sql.push_str(&format!(
            ", {} {}",
            quote_ident(&column.name)?,
            column.param_type.sql_type()
        ));
    }
    create_sql.push(')');

    let conn = db.lock();
    conn.execute(&create_sql, [])?;

    Ok(flight)
}

/// Register a staged flight, replacing any flight with the same name
pub fn register_flight(db: &DbConnection, flight: &Flight, columns: &[ColumnDef]) -> DbResult<()> {
    let mut conn = db.lock();
    let tx = conn.transaction()?;

    let previous: Option<(String, String)> = tx
        .query_row(
            "SELECT id, table_name FROM flights WHERE name = ?1",
            [&flight.name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    if let Some((old_id, old_table)) = previous {
        log::info!("Replacing existing flight {} ({})", flight.name, old_table);
        tx.execute("DELETE FROM flights WHERE id = ?1", [old_id])?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(&old_table)?), [])?;
    }

    tx.execute(
        "INSERT INTO flights (id, name, table_name, created_at, source_path, source_sha256, row_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            flight.id.to_string(),
            flight.name,
            flight.table_name,
            flight.created_at.to_rfc3339(),
            flight.source_path,
            flight.source_sha256,
            flight.row_count,
        ],
    )?;

    for column in columns {
        tx.execute(
            "INSERT INTO flight_columns (flight_id, ordinal, raw_name, name, param_type, good)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                flight.id.to_string(),
                column.ordinal as i64,
                column.raw_name,
                column.name,
                column.param_type.as_str(),
                column.good,
            ],
        )?;
    }

    tx.commit()?;

    Ok(())
}

/// Drop the data table of a flight that was staged but never registered
pub fn discard_staged_flight(db: &DbConnection, flight: &Flight) -> DbResult<()> {
    let conn = db.lock();
    conn.execute(
        &format!("DROP TABLE IF EXISTS {}", quote_ident(&flight.table_name)?),
        [],
    )?;
    Ok(())
}

fn flight_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Flight> {
    Ok(Flight {
        id: parse_uuid(0, row.get(0)?)?,
        name: row.get(1)?,
        table_name: row.get(2)?,
        created_at: parse_timestamp(3, row.get(3)?)?,
        source_path: row.get(4)?,
        source_sha256: row.get(5)?,
        row_count: row.get(6)?,
    })
}

/// Get a flight by name
pub fn get_flight(db: &DbConnection, name: &str) -> DbResult<Option<Flight>> {
    let conn = db.lock();
    let mut stmt = conn.prepare(
        "SELECT id, name, table_name, created_at, source_path, source_sha256, row_count
         FROM flights WHERE name = ?1",
    )?;

    let result = stmt.query_row([name], flight_from_row);

    match result {
        Ok(flight) => Ok(Some(flight)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// List all flights with column counts
pub fn list_flights(db: &DbConnection) -> DbResult<Vec<FlightSummary>> {
    let conn = db.lock();
    let mut stmt = conn.prepare(
        "SELECT f.id, f.name, f.created_at, f.row_count,
                (SELECT COUNT(*) FROM flight_columns c WHERE c.flight_id = f.id AND c.good = 1),
                EXISTS (SELECT 1 FROM flight_events e WHERE e.flight_id = f.id)
         FROM flights f
         ORDER BY f.created_at DESC",
    )?;

    let flights = stmt
        .query_map([], |row| {
            Ok(FlightSummary {
                id: parse_uuid(0, row.get(0)?)?,
                name: row.get(1)?,
                created_at: parse_timestamp(2, row.get(2)?)?,
                row_count: row.get(3)?,
                column_count: row.get(4)?,
                analyzed: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(flights)
}

/// Delete a flight, its data table and its events
/// Returns whether the flight existed
pub fn delete_flight(db: &DbConnection, name: &str) -> DbResult<bool> {
    let flight = match get_flight(db, name)? {
        Some(f) => f,
        None => return Ok(false),
    };

    let mut conn = db.lock();
    let tx = conn.transaction()?;
    tx.execute(
        &format!("DROP TABLE IF EXISTS {}", quote_ident(&flight.table_name)?),
        [],
    )?;
    tx.execute("DELETE FROM flights WHERE id = ?1", [flight.id.to_string()])?;
    tx.commit()?;

    Ok(true)
}

// ==================== COLUMN QUERIES ====================

/// Get the column definitions of a flight in header order
pub fn get_column_definitions(db: &DbConnection, flight_id: &Uuid) -> DbResult<Vec<ColumnDef>> {
    let conn = db.lock();
    let mut stmt = conn.prepare(
        "SELECT ordinal, raw_name, name, param_type, good
         FROM flight_columns WHERE flight_id = ?1
         ORDER BY ordinal",
    )?;

    let columns = stmt
        .query_map([flight_id.to_string()], |row| {
            Ok(ColumnDef {
                ordinal: row.get::<_, i64>(0)? as usize,
                raw_name: row.get(1)?,
                name: row.get(2)?,
                param_type: ParamType::from_string(&row.get::<_, String>(3)?),
                good: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(columns)
}

// ==================== SAMPLE QUERIES ====================

/// Insert a batch of rows in one transaction
/// Each row holds one value per good column, in header order
pub fn insert_rows(
    db: &DbConnection,
    flight: &Flight,
    columns: &[ColumnDef],
    rows: &[Vec<Value>],
) -> DbResult<usize> {
    let good: Vec<&ColumnDef> = columns.iter().filter(|c| c.good).collect();

    let names = good
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<DbResult<Vec<_>>>()?;
    let placeholders: Vec<String> = (1..=good.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(&flight.table_name)?,
        names.join(", "),
        placeholders.join(", ")
    );

    let mut conn = db.lock();
    let tx = conn.transaction()?;
    let mut written = 0;
    {
        let mut stmt = tx.prepare_cached(&sql)?;
        for row in rows {
            if row.len() != good.len() {
                log::warn!(
                    "Skipping row with {} values for {} columns in {}",
                    row.len(),
                    good.len(),
                    flight.name
                );
                continue;
            }
            stmt.execute(params_from_iter(row.iter()))?;
            written += 1;
        }
    }
    tx.commit()?;

    Ok(written)
}

/// Read one field as a number; failures carry the raw text
fn field_to_f64(value: ValueRef<'_>) -> Result<f64, String> {
    match value {
        ValueRef::Null => Err(String::new()),
        ValueRef::Integer(i) => Ok(i as f64),
        ValueRef::Real(f) => Ok(f),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            text.trim().parse::<f64>().map_err(|_| text.to_string())
        }
        ValueRef::Blob(_) => Err("<blob>".to_string()),
    }
}

/// Read the time axis plus `attributes` of a flight into a series buffer
///
/// The first declared column of the flight is the time axis, in hours.
/// Unknown flights give an empty buffer. An attribute the flight does not
/// have fails to convert on every row.
pub fn read_series(
    db: &DbConnection,
    series_id: &str,
    attributes: &[&str],
) -> DbResult<SeriesBuffer> {
    let flight = match get_flight(db, series_id)? {
        Some(f) => f,
        None => {
            log::warn!("No flight named {}; returning an empty series", series_id);
            return Ok(SeriesBuffer::empty(series_id, attributes));
        }
    };

    let columns = get_column_definitions(db, &flight.id)?;
    let time_column = match columns.iter().find(|c| c.good) {
        Some(c) => c,
        None => {
            log::warn!("Flight {} has no stored columns", flight.name);
            return Ok(SeriesBuffer::empty(series_id, attributes));
        }
    };

    // Result column of each attribute; None when the flight lacks it
    let mut selected = vec![quote_ident(&time_column.name)?];
    let mut sources = Vec::with_capacity(attributes.len());
    for attribute in attributes {
        if columns.iter().any(|c| c.good && c.name == *attribute) {
            selected.push(quote_ident(attribute)?);
            sources.push(Some(selected.len() - 1));
        } else {
            log::warn!(
                "Flight {} has no attribute {}; no row can be converted",
                flight.name,
                attribute
            );
            sources.push(None);
        }
    }

    let sql = format!(
        "SELECT {} FROM {} ORDER BY ID",
        selected.join(", "),
        quote_ident(&flight.table_name)?
    );

    let mut builder = SeriesBuilder::new(series_id, attributes);

    let conn = db.lock();
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let time = field_to_f64(row.get_ref(0)?);
        let mut values = Vec::with_capacity(sources.len());
        for source in &sources {
            values.push(match source {
                Some(idx) => field_to_f64(row.get_ref(*idx)?),
                None => Err(String::new()),
            });
        }
        builder.push_row(time, values);
    }

    let buffer = builder.finish();
    if !buffer.conversion_errors().is_empty() {
        log::warn!(
            "{}: {} fields could not be converted; affected rows were left out",
            series_id,
            buffer.conversion_errors().len()
        );
    }

    Ok(buffer)
}

// ==================== EVENT QUERIES ====================

/// Store the detected events of a flight, replacing earlier results
pub fn save_events(db: &DbConnection, flight_id: &Uuid, events: &EventSet) -> DbResult<()> {
    let detected_at = Utc::now().to_rfc3339();

    let mut conn = db.lock();
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM flight_events WHERE flight_id = ?1",
        [flight_id.to_string()],
    )?;

    for event in events.iter() {
        tx.execute(
            "INSERT INTO flight_events (flight_id, kind, description, sequence_rank, time, raw_value, normalized_value, found, detected_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                flight_id.to_string(),
                event.kind.code(),
                event.description,
                event.sequence_rank,
                event.time as i64,
                event.raw_value,
                event.normalized_value,
                event.found,
                detected_at,
            ],
        )?;
    }

    tx.commit()?;
    Ok(())
}

/// Get the stored events of a flight, if it was analyzed
pub fn list_events(
    db: &DbConnection,
    flight: &Flight,
    definitions: &EventDefinitions,
) -> DbResult<Option<EventSet>> {
    let conn = db.lock();
    let mut stmt = conn.prepare(
        "SELECT kind, description, sequence_rank, time, raw_value, normalized_value, found
         FROM flight_events WHERE flight_id = ?1
         ORDER BY sequence_rank",
    )?;

    let events = stmt
        .query_map([flight.id.to_string()], |row| {
            let code: String = row.get(0)?;
            let kind = EventKind::from_code(&code).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    Type::Text,
                    format!("unknown event kind {}", code).into(),
                )
            })?;

            Ok(Event {
                kind,
                name: kind.code().to_string(),
                description: row.get(1)?,
                sequence_rank: row.get(2)?,
                time: row.get::<_, i64>(3)? as u64,
                raw_value: row.get(4)?,
                normalized_value: row.get(5)?,
                found: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if events.is_empty() {
        return Ok(None);
    }

    Ok(Some(EventSet::from_events(flight.name.clone(), events, definitions)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventDetector, DETECTION_ATTRIBUTES};

    fn column(ordinal: usize, name: &str, param_type: ParamType) -> ColumnDef {
        ColumnDef {
            ordinal,
            raw_name: name.to_string(),
            name: name.to_string(),
            param_type,
            good: true,
        }
    }

    fn seed_columns() -> Vec<ColumnDef> {
        vec![
            column(0, "_zulu_time", ParamType::Numeric),
            column(1, "Vel_Indicated_kts", ParamType::Numeric),
            column(2, "Tail", ParamType::Text),
        ]
    }

    fn seed_named(db: &DbConnection, name: &str) -> Flight {
        let columns = seed_columns();
        let mut flight = stage_flight(
            db,
            name,
            "/tmp/n123.csv".to_string(),
            "abc".to_string(),
            &columns,
        )
        .unwrap();

        let rows = vec![
            vec![Value::Real(0.0), Value::Real(90.0), Value::Text("N123".into())],
            vec![Value::Real(0.5), Value::Real(70.0), Value::Text("N123".into())],
            vec![Value::Real(1.0), Value::Null, Value::Text("N123".into())],
        ];
        assert_eq!(insert_rows(db, &flight, &columns, &rows).unwrap(), 3);
        flight.row_count = 3;
        register_flight(db, &flight, &columns).unwrap();
        flight
    }

    fn seed_flight(db: &DbConnection) -> Flight {
        seed_named(db, "N123 approach")
    }

    fn table_exists(db: &DbConnection, table: &str) -> bool {
        let conn = db.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn test_table_name_for() {
        let id = Uuid::new_v4();
        assert_eq!(table_name_for(&id), format!("flight_{}", id.simple()));
        assert_ne!(table_name_for(&id), table_name_for(&Uuid::new_v4()));
    }

    #[test]
    fn test_stage_rejects_blank_name() {
        let db = DbConnection::open_in_memory().unwrap();
        let err = stage_flight(&db, "  ", String::new(), String::new(), &seed_columns());
        assert!(matches!(err, Err(DbError::InvalidName(_))));
    }

    #[test]
    fn test_create_and_get_flight() {
        let db = DbConnection::open_in_memory().unwrap();
        let flight = seed_flight(&db);

        let stored = get_flight(&db, "N123 approach").unwrap().unwrap();
        assert_eq!(stored.id, flight.id);
        assert_eq!(stored.row_count, 3);

        let columns = get_column_definitions(&db, &flight.id).unwrap();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[2].param_type, ParamType::Text);

        let flights = list_flights(&db).unwrap();
        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0].column_count, 3);
        assert!(!flights[0].analyzed);
    }

    #[test]
    fn test_read_series_rejects_null_rows() {
        let db = DbConnection::open_in_memory().unwrap();
        seed_flight(&db);

        let buffer = read_series(&db, "N123 approach", &["Vel_Indicated_kts"]).unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.points()[1].time, 18_000_000);
        assert_eq!(buffer.metadata()[0].min, 70.0);
        assert_eq!(buffer.metadata()[0].max, 90.0);
        assert_eq!(buffer.conversion_errors().len(), 1);
        assert_eq!(buffer.conversion_errors()[0].row, 2);
    }

    #[test]
    fn test_read_series_text_column_fails_conversion() {
        let db = DbConnection::open_in_memory().unwrap();
        seed_flight(&db);

        let buffer = read_series(&db, "N123 approach", &["Tail"]).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.conversion_errors().len(), 3);
        assert_eq!(buffer.conversion_errors()[0].raw, "N123");
    }

    #[test]
    fn test_read_series_unknown_flight_is_empty() {
        let db = DbConnection::open_in_memory().unwrap();
        let buffer = read_series(&db, "nope", &["Vel_Indicated_kts", "Gear"]).unwrap();

        assert!(buffer.is_empty());
        assert_eq!(buffer.attribute_count(), 2);
    }

    #[test]
    fn test_read_series_missing_attribute_fails_every_row() {
        let db = DbConnection::open_in_memory().unwrap();
        seed_flight(&db);

        let buffer = read_series(&db, "N123 approach", &["Vel_Indicated_kts", "Gear"]).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.attribute_names(), vec!["Vel_Indicated_kts", "Gear"]);
        assert_eq!(buffer.metadata()[1].count, 0);

        // Row 2 also has a NULL speed; every row names the missing column
        let missing: Vec<_> = buffer
            .conversion_errors()
            .iter()
            .filter(|e| e.column == "Gear")
            .map(|e| e.row)
            .collect();
        assert_eq!(missing, vec![0, 1, 2]);
    }

    #[test]
    fn test_recreate_flight_replaces_data() {
        let db = DbConnection::open_in_memory().unwrap();
        let first = seed_flight(&db);
        let flight = seed_flight(&db);

        let buffer = read_series(&db, "N123 approach", &["Vel_Indicated_kts"]).unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(list_flights(&db).unwrap().len(), 1);
        assert_eq!(get_flight(&db, "N123 approach").unwrap().unwrap().id, flight.id);
        assert!(!table_exists(&db, &first.table_name));
        assert!(table_exists(&db, &flight.table_name));
    }

    #[test]
    fn test_similar_names_keep_separate_flights() {
        let db = DbConnection::open_in_memory().unwrap();
        let spaced = seed_named(&db, "N123 approach");
        let dashed = seed_named(&db, "N123-approach");

        assert_ne!(spaced.table_name, dashed.table_name);
        assert_eq!(list_flights(&db).unwrap().len(), 2);
        for name in ["N123 approach", "N123-approach"] {
            let buffer = read_series(&db, name, &["Vel_Indicated_kts"]).unwrap();
            assert_eq!(buffer.len(), 2);
        }
    }

    #[test]
    fn test_staged_flight_stays_hidden_until_registered() {
        let db = DbConnection::open_in_memory().unwrap();
        let old = seed_flight(&db);

        let staged = stage_flight(
            &db,
            "N123 approach",
            "/tmp/other.csv".to_string(),
            "def".to_string(),
            &seed_columns(),
        )
        .unwrap();
        assert_eq!(get_flight(&db, "N123 approach").unwrap().unwrap().id, old.id);

        discard_staged_flight(&db, &staged).unwrap();
        assert!(!table_exists(&db, &staged.table_name));
        assert_eq!(read_series(&db, "N123 approach", &["Vel_Indicated_kts"]).unwrap().len(), 2);
    }

    #[test]
    fn test_delete_flight() {
        let db = DbConnection::open_in_memory().unwrap();
        seed_flight(&db);

        assert!(delete_flight(&db, "N123 approach").unwrap());
        assert!(!delete_flight(&db, "N123 approach").unwrap());
        assert!(get_flight(&db, "N123 approach").unwrap().is_none());
    }

    #[test]
    fn test_save_and_list_events() {
        let db = DbConnection::open_in_memory().unwrap();
        let flight = seed_flight(&db);
        let definitions = EventDefinitions::default();

        assert!(list_events(&db, &flight, &definitions).unwrap().is_none());

        let detector = EventDetector::default();
        let buffer = SeriesBuffer::from_points(
            flight.name.clone(),
            &DETECTION_ATTRIBUTES,
            vec![crate::series::SamplePoint::new(
                100,
                vec![95.0, 800.0, 1.0, 0.0, 1.0],
            )],
        );
        let events = detector.detect(&buffer);
        save_events(&db, &flight.id, &events).unwrap();

        let stored = list_events(&db, &flight, &definitions).unwrap().unwrap();
        assert_eq!(stored, events);
        assert!(list_flights(&db).unwrap()[0].analyzed);
    }
}
