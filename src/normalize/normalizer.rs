// Min-max normalizer
// Rescales series values into [0, 1] using each attribute's statistics

use crate::series::{AttributeMetadata, MetadataAccumulator, SeriesBuffer};

/// Rescale `value` into the unit interval defined by `min` and `max`
///
/// Zero-width (`min == max`) and inverted (`min > max`) ranges return 0, as
/// does any non-finite input. The result is not clamped.
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if !(value.is_finite() && min.is_finite() && max.is_finite()) {
        return 0.0;
    }
    if min >= max {
        return 0.0;
    }

    (value - min) / (max - min)
}

/// A transform over a whole series buffer
pub trait Processor {
    /// Short name used in logs and traces
    fn name(&self) -> &'static str;

    /// Produce a transformed copy, leaving `buffer` untouched
    fn process(&self, buffer: &SeriesBuffer) -> SeriesBuffer;
}

/// Normalizes every attribute of a buffer against its own min/max
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Normalizer
    }

    /// Normalize in place, for callers that do not need the raw values
    pub fn process_in_place(&self, buffer: &mut SeriesBuffer) {
        let bounds: Vec<(f64, f64)> = buffer.metadata().iter().map(|m| (m.min, m.max)).collect();
        let names: Vec<String> = buffer.metadata().iter().map(|m| m.name.clone()).collect();
        let series_id = buffer.series_id().to_string();

        let mut substituted = 0usize;
        for point in buffer.points_mut() {
            for (j, value) in point.values.iter_mut().enumerate() {
                let Some(&(min, max)) = bounds.get(j) else {
                    continue;
                };
                let raw = if value.is_finite() {
                    *value
                } else {
                    substituted += 1;
                    min
                };
                *value = normalize(raw, min, max);
            }
        }

        if substituted > 0 {
            log::warn!(
                "Normalizing {}: {} non-finite values replaced by the attribute minimum",
                series_id,
                substituted
            );
        }

        let metadata = recompute_metadata(buffer, &names);
        buffer.set_metadata(metadata);
    }
}

impl Processor for Normalizer {
    fn name(&self) -> &'static str {
        "normalize"
    }

    fn process(&self, buffer: &SeriesBuffer) -> SeriesBuffer {
        let mut normalized = buffer.clone();
        self.process_in_place(&mut normalized);
        normalized
    }
}

fn recompute_metadata(buffer: &SeriesBuffer, names: &[String]) -> Vec<AttributeMetadata> {
    let mut accumulators: Vec<MetadataAccumulator> =
        names.iter().map(|n| MetadataAccumulator::new(n.as_str())).collect();

    for point in buffer.points() {
        for (acc, value) in accumulators.iter_mut().zip(&point.values) {
            acc.push(*value);
        }
    }

    accumulators.into_iter().map(MetadataAccumulator::finish).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::SamplePoint;

    fn buffer() -> SeriesBuffer {
        SeriesBuffer::from_points(
            "flight1",
            &["IAS", "Gear"],
            vec![
                SamplePoint::new(0, vec![60.0, 1.0]),
                SamplePoint::new(10, vec![90.0, 1.0]),
                SamplePoint::new(20, vec![120.0, 1.0]),
            ],
        )
    }

    #[test]
    fn test_normalize_range() {
        assert_eq!(normalize(75.0, 50.0, 150.0), 0.25);
        assert_eq!(normalize(-5.0, -10.0, 10.0), 0.25);
        // Not clamped outside the range
        assert_eq!(normalize(200.0, 50.0, 150.0), 1.5);
    }

    #[test]
    fn test_normalize_boundaries() {
        for (min, max) in [(0.0, 1.0), (-3.0, 7.5), (60.0, 140.0)] {
            assert_eq!(normalize(min, min, max), 0.0);
            assert_eq!(normalize(max, min, max), 1.0);
        }
    }

    #[test]
    fn test_normalize_degenerate_ranges() {
        assert_eq!(normalize(3.0, 0.0, 0.0), 0.0);
        assert_eq!(normalize(3.0, 10.0, 5.0), 0.0);
        assert_eq!(normalize(5.0, 5.0, 5.0), 0.0);
        assert_eq!(normalize(f64::NAN, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_process_leaves_input_untouched() {
        let raw = buffer();
        let normalized = Normalizer::new().process(&raw);

        assert_eq!(raw.points()[1].values, vec![90.0, 1.0]);
        assert_eq!(normalized.points()[0].values, vec![0.0, 0.0]);
        assert_eq!(normalized.points()[1].values, vec![0.5, 0.0]);
        assert_eq!(normalized.points()[2].values, vec![1.0, 0.0]);
        assert_eq!(normalized.points()[2].time, 20);
    }

    #[test]
    fn test_process_recomputes_metadata() {
        let normalized = Normalizer::new().process(&buffer());
        let ias = &normalized.metadata()[0];
        let gear = &normalized.metadata()[1];

        assert_eq!(ias.name, "IAS");
        assert_eq!((ias.min, ias.max, ias.count), (0.0, 1.0, 3));
        assert_eq!((gear.min, gear.max), (0.0, 0.0));
    }

    #[test]
    fn test_non_finite_values_fall_back_to_min() {
        let raw = SeriesBuffer::from_parts(
            "f".to_string(),
            vec![
                SamplePoint::new(0, vec![10.0]),
                SamplePoint::new(1, vec![f64::NAN]),
                SamplePoint::new(2, vec![20.0]),
            ],
            vec![MetadataAccumulator::from_values("IAS", &[10.0, 20.0])],
            Vec::new(),
        );

        let mut normalized = raw.clone();
        Normalizer::new().process_in_place(&mut normalized);
        assert_eq!(normalized.points()[1].values, vec![0.0]);
        assert_eq!(normalized.points()[2].values, vec![1.0]);
    }

    #[test]
    fn test_empty_buffer_normalizes_to_empty() {
        let raw = SeriesBuffer::empty("none", &["IAS"]);
        let normalized = Normalizer::new().process(&raw);
        assert!(normalized.is_empty());
        assert_eq!(normalized.attribute_names(), vec!["IAS"]);
    }
}
