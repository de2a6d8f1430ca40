// Series buffer types
// One flight's ordered sample points plus per-attribute statistics

use serde::{Deserialize, Serialize};

use crate::series::stats::{AttributeMetadata, MetadataAccumulator};

/// Ticks are 100 microsecond increments
pub const TICKS_PER_SECOND: u64 = 10_000;

/// 60 minutes * 60 seconds * 10 000 ticks
pub const TICKS_PER_HOUR: u64 = 36_000_000;

/// Convert a recorder time stamp in hours to ticks
/// Returns `None` for negative or non-finite input
pub fn hours_to_ticks(hours: f64) -> Option<u64> {
    if !hours.is_finite() || hours < 0.0 {
        return None;
    }
    Some((hours * TICKS_PER_HOUR as f64).round() as u64)
}

/// One time-stamped observation
/// `values` is index-aligned with the attribute list used for the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub time: u64,
    pub values: Vec<f64>,
}

impl SamplePoint {
    pub fn new(time: u64, values: Vec<f64>) -> Self {
        SamplePoint { time, values }
    }

    pub fn value(&self, idx: usize) -> Option<f64> {
        self.values.get(idx).copied()
    }
}

/// A field that could not be read as a number
/// The whole row it belongs to is left out of the buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionError {
    /// Row number within the query result (0-based)
    pub row: u64,

    /// Column that failed ("time" for the time axis)
    pub column: String,

    /// Raw field content, empty for NULL
    pub raw: String,
}

/// Ordered sample points of one series and the statistics of each attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesBuffer {
    series_id: String,
    points: Vec<SamplePoint>,
    metadata: Vec<AttributeMetadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    conversion_errors: Vec<ConversionError>,
}

impl SeriesBuffer {
    /// Buffer with no points for the given attributes
    pub fn empty(series_id: impl Into<String>, attributes: &[&str]) -> Self {
        SeriesBuffer {
            series_id: series_id.into(),
            points: Vec::new(),
            metadata: attributes
                .iter()
                .map(|name| AttributeMetadata::empty(*name))
                .collect(),
            conversion_errors: Vec::new(),
        }
    }

    /// Build a buffer from already numeric points, computing the statistics
    /// Points whose arity does not match `attributes` are skipped
    pub fn from_points(
        series_id: impl Into<String>,
        attributes: &[&str],
        points: Vec<SamplePoint>,
    ) -> Self {
        let mut builder = SeriesBuilder::new(series_id, attributes);
        for point in points {
            builder.push_point(point);
        }
        builder.finish()
    }

    /// Assemble a buffer from parts that are already consistent
    pub(crate) fn from_parts(
        series_id: String,
        points: Vec<SamplePoint>,
        metadata: Vec<AttributeMetadata>,
        conversion_errors: Vec<ConversionError>,
    ) -> Self {
        SeriesBuffer {
            series_id,
            points,
            metadata,
            conversion_errors,
        }
    }

    pub fn series_id(&self) -> &str {
        &self.series_id
    }

    pub fn points(&self) -> &[SamplePoint] {
        &self.points
    }

    pub(crate) fn points_mut(&mut self) -> &mut [SamplePoint] {
        &mut self.points
    }

    pub fn metadata(&self) -> &[AttributeMetadata] {
        &self.metadata
    }

    pub(crate) fn set_metadata(&mut self, metadata: Vec<AttributeMetadata>) {
        self.metadata = metadata;
    }

    pub fn conversion_errors(&self) -> &[ConversionError] {
        &self.conversion_errors
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn attribute_count(&self) -> usize {
        self.metadata.len()
    }

    pub fn attribute_names(&self) -> Vec<&str> {
        self.metadata.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.metadata.iter().position(|m| m.name == name)
    }

    /// Values of one attribute across every point
    pub fn column(&self, idx: usize) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().filter_map(move |p| p.value(idx))
    }

    /// Time span covered by the points, in ticks
    pub fn duration_ticks(&self) -> u64 {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => last.time.saturating_sub(first.time),
            _ => 0,
        }
    }
}

/// Incrementally builds a `SeriesBuffer` while rows are read
pub struct SeriesBuilder {
    series_id: String,
    accumulators: Vec<MetadataAccumulator>,
    points: Vec<SamplePoint>,
    errors: Vec<ConversionError>,
    rows_seen: u64,
}

impl SeriesBuilder {
    pub fn new(series_id: impl Into<String>, attributes: &[&str]) -> Self {
        SeriesBuilder {
            series_id: series_id.into(),
            accumulators: attributes
                .iter()
                .map(|name| MetadataAccumulator::new(*name))
                .collect(),
            points: Vec::new(),
            errors: Vec::new(),
            rows_seen: 0,
        }
    }

    /// Add one row of converted fields
    ///
    /// `time_hours` is the time axis in hours; each entry of `values` is the
    /// numeric field or the raw text that failed to convert. A row with any
    /// failed field is rejected whole and its failures are recorded.
    /// Returns whether the row became a point.
    pub fn push_row(
        &mut self,
        time_hours: Result<f64, String>,
        values: Vec<Result<f64, String>>,
    ) -> bool {
        let row = self.rows_seen;
        self.rows_seen += 1;

        let mut failures = Vec::new();

        let time = match time_hours {
            Ok(hours) => match hours_to_ticks(hours) {
                Some(ticks) => Some(ticks),
                None => {
                    failures.push(ConversionError {
                        row,
                        column: "time".to_string(),
                        raw: hours.to_string(),
                    });
                    None
                }
            },
            Err(raw) => {
                failures.push(ConversionError {
                    row,
                    column: "time".to_string(),
                    raw,
                });
                None
            }
        };

        if values.len() != self.accumulators.len() {
            failures.push(ConversionError {
                row,
                column: "*".to_string(),
                raw: format!(
                    "{} fields for {} attributes",
                    values.len(),
                    self.accumulators.len()
                ),
            });
        }

        let mut numeric = Vec::with_capacity(values.len());
        for (idx, field) in values.into_iter().enumerate() {
            match field {
                Ok(v) if v.is_finite() => numeric.push(v),
                Ok(v) => failures.push(self.failure(row, idx, v.to_string())),
                Err(raw) => failures.push(self.failure(row, idx, raw)),
            }
        }

        match time {
            Some(time) if failures.is_empty() => {
                for (acc, value) in self.accumulators.iter_mut().zip(&numeric) {
                    acc.push(*value);
                }
                self.points.push(SamplePoint::new(time, numeric));
                true
            }
            _ => {
                for failure in &failures {
                    log::warn!(
                        "Rejected row {} of {}: column {} is not numeric ({:?})",
                        failure.row,
                        self.series_id,
                        failure.column,
                        failure.raw
                    );
                }
                self.errors.extend(failures);
                false
            }
        }
    }

    /// Add an already numeric point
    pub fn push_point(&mut self, point: SamplePoint) -> bool {
        if point.values.len() != self.accumulators.len() {
            log::warn!(
                "Skipping point at t={} of {}: {} values for {} attributes",
                point.time,
                self.series_id,
                point.values.len(),
                self.accumulators.len()
            );
            return false;
        }
        self.rows_seen += 1;
        for (acc, value) in self.accumulators.iter_mut().zip(&point.values) {
            acc.push(*value);
        }
        self.points.push(point);
        true
    }

    fn failure(&self, row: u64, idx: usize, raw: String) -> ConversionError {
        let column = self
            .accumulators
            .get(idx)
            .map(|acc| acc.name().to_string())
            .unwrap_or_else(|| idx.to_string());
        ConversionError { row, column, raw }
    }

    pub fn finish(self) -> SeriesBuffer {
        SeriesBuffer {
            series_id: self.series_id,
            points: self.points,
            metadata: self
                .accumulators
                .into_iter()
                .map(MetadataAccumulator::finish)
                .collect(),
            conversion_errors: self.errors,
        }
    }
}
