// Landing event detector
// Single pass over a flight with first-occurrence latches and a touchdown
// persistence rule

use serde::{Deserialize, Serialize};

use crate::events::definitions::EventDefinitions;
use crate::events::timeline::EventTimeline;
use crate::events::types::{EventKind, EventSet};
use crate::series::{SamplePoint, SeriesBuffer, TICKS_PER_SECOND};
use crate::state::{AttributeStore, DbResult};

/// Attributes queried for detection, in column order
pub const DETECTION_ATTRIBUTES: [&str; 5] = [
    "Vel_Indicated_kts",
    "Altitude_FtAgl",
    "Flaps_Handle",
    "RunwayThreshold",
    "Gear",
];

// Must match the order of DETECTION_ATTRIBUTES
const IAS_IDX: usize = 0;
const ALT_AGL_IDX: usize = 1;
const FLAP_HANDLE_IDX: usize = 2;
const ON_RUNWAY_IDX: usize = 3;
const GEAR_IDX: usize = 4;

/// Trigger thresholds for the watch conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorThresholds {
    /// Flaps handle position above which VFe40 latches
    pub flap_partial: f64,

    /// Flaps handle position at which VFe100 latches (exact match)
    pub flap_full: f64,

    /// Gear value above which VLg latches
    pub gear_down: f64,

    /// Runway threshold flag above which VThrshld/AltThrshld latch
    pub on_runway: f64,

    /// AGL altitude (ft) below which a landing may be in progress
    pub touchdown_altitude_ft: f64,

    /// How long the altitude must stay below the touchdown altitude, in ticks
    pub touchdown_hold_ticks: u64,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        DetectorThresholds {
            flap_partial: 0.5,
            flap_full: 1.0,
            gear_down: 0.5,
            on_runway: 0.5,
            touchdown_altitude_ft: 1.0,
            touchdown_hold_ticks: 15 * TICKS_PER_SECOND,
        }
    }
}

/// Detects the six landing events of a flight
/// Holds no per-flight state, so one detector can serve many flights
#[derive(Debug, Clone, Default)]
pub struct EventDetector {
    definitions: EventDefinitions,
    thresholds: DetectorThresholds,
}

impl EventDetector {
    pub fn new(definitions: EventDefinitions, thresholds: DetectorThresholds) -> Self {
        EventDetector {
            definitions,
            thresholds,
        }
    }

    pub fn definitions(&self) -> &EventDefinitions {
        &self.definitions
    }

    pub fn thresholds(&self) -> &DetectorThresholds {
        &self.thresholds
    }

    /// Query the detection attributes of `series_id` and detect its events
    pub fn detect_flight<S: AttributeStore + ?Sized>(
        &self,
        store: &S,
        series_id: &str,
    ) -> DbResult<EventSet> {
        let buffer = store.get_data_attributes(series_id, &DETECTION_ATTRIBUTES)?;
        Ok(self.detect(&buffer))
    }

    /// Run one pass over `buffer` and return all six events
    ///
    /// `buffer` must hold the `DETECTION_ATTRIBUTES` columns in order;
    /// any other layout yields six unfound events.
    pub fn detect(&self, buffer: &SeriesBuffer) -> EventSet {
        let mut pass = DetectionPass::new(self, buffer.series_id());

        if buffer.attribute_names() != DETECTION_ATTRIBUTES {
            log::warn!(
                "Event detection for {} needs attributes {:?}, got {:?}",
                buffer.series_id(),
                DETECTION_ATTRIBUTES,
                buffer.attribute_names()
            );
            return pass.events;
        }

        for point in buffer.points() {
            pass.step(point);
        }

        let events = pass.events;
        log::info!(
            "Detected {}/{} events for {} over {} points",
            events.found_count(),
            events.len(),
            buffer.series_id(),
            buffer.len()
        );
        EventTimeline::from_events(&events).log();

        events
    }
}

/// Mutable state of a single detection pass
struct DetectionPass<'a> {
    detector: &'a EventDetector,
    events: EventSet,
    // Anchor of a potential landing: (time, IAS)
    landing_anchor: Option<(u64, f64)>,
}

impl<'a> DetectionPass<'a> {
    fn new(detector: &'a EventDetector, series_id: &str) -> Self {
        DetectionPass {
            detector,
            events: EventSet::pending(series_id, &detector.definitions),
            landing_anchor: None,
        }
    }

    fn step(&mut self, point: &SamplePoint) {
        let detector = self.detector;
        let t = &detector.thresholds;
        let ias = point.values[IAS_IDX];
        let alt_agl = point.values[ALT_AGL_IDX];
        let flap = point.values[FLAP_HANDLE_IDX];
        let on_runway = point.values[ON_RUNWAY_IDX];
        let gear = point.values[GEAR_IDX];

        if flap > t.flap_partial {
            self.latch(EventKind::VFe40, point.time, ias);
        }

        if gear > t.gear_down {
            self.latch(EventKind::VLg, point.time, ias);
        }

        if flap == t.flap_full {
            self.latch(EventKind::VFe100, point.time, ias);
        }

        if on_runway > t.on_runway && !self.events.is_found(EventKind::VThrshld) {
            self.latch(EventKind::VThrshld, point.time, ias);
            self.latch(EventKind::AltThrshld, point.time + 1, alt_agl);
        }

        if !self.events.is_found(EventKind::VTouchdown) {
            let hold_ticks = t.touchdown_hold_ticks;
            if alt_agl < t.touchdown_altitude_ft {
                match self.landing_anchor {
                    None => self.landing_anchor = Some((point.time, ias)),
                    Some((start, start_ias)) => {
                        if point.time.saturating_sub(start) >= hold_ticks {
                            self.latch(EventKind::VTouchdown, start, start_ias);
                        }
                    }
                }
            } else {
                self.landing_anchor = None;
            }
        }
    }

    /// Record the first occurrence of `kind`; later calls are ignored
    fn latch(&mut self, kind: EventKind, time: u64, raw_value: f64) {
        let normalized_value = self.detector.definitions.get(kind).normalize(raw_value);
        let event = self.events.get_mut(kind);
        if event.found {
            return;
        }

        event.found = true;
        event.time = time;
        event.raw_value = raw_value;
        event.normalized_value = normalized_value;

        log::debug!(
            "{}: {} at t={} value={}",
            self.events.series_id,
            kind.code(),
            time,
            raw_value
        );
    }
}
