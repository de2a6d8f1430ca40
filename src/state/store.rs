// Attribute store seam
// Query access to stored flights, backed by SQLite or by memory
use std::collections::HashMap;
use std::sync::RwLock;

use super::db::{DbConnection, DbResult};
use super::queries;
use crate::series::{SeriesBuffer, SeriesBuilder};

/// Source of time-ordered attribute data for a flight
pub trait AttributeStore {
    /// Time axis plus the requested attributes, in request order
    ///
    /// Rows with an unconvertible field are left out and reported through
    /// the buffer's conversion errors. An unknown `series_id` yields an
    /// empty buffer; an attribute the series lacks fails on every row.
    fn get_data_attributes(&self, series_id: &str, attributes: &[&str])
        -> DbResult<SeriesBuffer>;
}

impl AttributeStore for DbConnection {
    fn get_data_attributes(
        &self,
        series_id: &str,
        attributes: &[&str],
    ) -> DbResult<SeriesBuffer> {
        queries::read_series(self, series_id, attributes)
    }
}

/// Raw text rows of one flight; the first column is the time axis in hours
#[derive(Debug, Clone, Default)]
struct MemoryFlight {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Read one raw field as a number; failures carry the raw text
fn parse_field(raw: Option<&String>) -> Result<f64, String> {
    match raw {
        Some(text) => text.trim().parse::<f64>().map_err(|_| text.clone()),
        None => Err(String::new()),
    }
}

/// In-memory attribute store over raw text rows, for hosts without a database
#[derive(Debug, Default)]
pub struct MemoryStore {
    flights: RwLock<HashMap<String, MemoryFlight>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a flight from its header and raw rows
    pub fn insert(&self, series_id: &str, columns: &[&str], rows: Vec<Vec<String>>) {
        let flight = MemoryFlight {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        };

        let mut flights = self.flights.write().unwrap_or_else(|p| p.into_inner());
        flights.insert(series_id.to_string(), flight);
    }

    pub fn contains(&self, series_id: &str) -> bool {
        let flights = self.flights.read().unwrap_or_else(|p| p.into_inner());
        flights.contains_key(series_id)
    }
}

impl AttributeStore for MemoryStore {
    fn get_data_attributes(
        &self,
        series_id: &str,
        attributes: &[&str],
    ) -> DbResult<SeriesBuffer> {
        let flights = self.flights.read().unwrap_or_else(|p| p.into_inner());
        let flight = match flights.get(series_id) {
            Some(f) => f,
            None => return Ok(SeriesBuffer::empty(series_id, attributes)),
        };

        let indices: Vec<Option<usize>> = attributes
            .iter()
            .map(|attribute| {
                let idx = flight.columns.iter().position(|c| c.as_str() == *attribute);
                if idx.is_none() {
                    log::warn!(
                        "Series {} has no attribute {}; no row can be converted",
                        series_id,
                        attribute
                    );
                }
                idx
            })
            .collect();

        let mut builder = SeriesBuilder::new(series_id, attributes);
        for row in &flight.rows {
            let values = indices
                .iter()
                .map(|&idx| parse_field(idx.and_then(|i| row.get(i))))
                .collect();
            builder.push_row(parse_field(row.first()), values);
        }

        Ok(builder.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|f| f.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_memory_store_selects_requested_columns() {
        let store = MemoryStore::new();
        store.insert(
            "f1",
            &["Time", "A", "B"],
            rows(&[&["0.0", "1", "5"], &["0.5", "2", "4"], &["1.0", "3", "3"]]),
        );

        let buffer = store.get_data_attributes("f1", &["B", "A"]).unwrap();
        assert_eq!(buffer.attribute_names(), vec!["B", "A"]);
        assert_eq!(buffer.points()[0].values, vec![5.0, 1.0]);
        assert_eq!(buffer.points()[1].time, 18_000_000);
        assert_eq!(buffer.metadata()[1].max, 3.0);
    }

    #[test]
    fn test_memory_store_unknown_series_and_attribute() {
        let store = MemoryStore::new();
        store.insert("f1", &["Time", "A"], rows(&[&["0", "1"]]));

        let empty = store.get_data_attributes("f2", &["A"]).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.metadata()[0].count, 0);

        let missing = store.get_data_attributes("f1", &["A", "Z"]).unwrap();
        assert!(missing.is_empty());
        assert_eq!(missing.attribute_names(), vec!["A", "Z"]);
        assert_eq!(missing.conversion_errors().len(), 1);
        assert_eq!(missing.conversion_errors()[0].column, "Z");
    }

    #[test]
    fn test_memory_store_rejects_unconvertible_rows() {
        let store = MemoryStore::new();
        store.insert(
            "f1",
            &["Time", "A"],
            rows(&[&["0", "1"], &["0.1", "n/a"], &["0.2"]]),
        );

        let buffer = store.get_data_attributes("f1", &["A"]).unwrap();
        assert_eq!(buffer.len(), 1);
        assert!(store.contains("f1"));

        let errors = buffer.conversion_errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].raw, "n/a");
        assert_eq!(errors[1].raw, "");
    }
}
