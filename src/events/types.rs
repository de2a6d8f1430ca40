// Landing event types
// Defines the six event kinds, detected event records and event sets

use serde::{Deserialize, Serialize};

use crate::events::definitions::EventDefinitions;

/// Landing-sequence events detected in a flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Flaps handle past 40% (IAS at extension)
    VFe40,

    /// Landing gear extended (IAS at extension)
    VLg,

    /// Flaps handle fully extended (IAS at extension)
    VFe100,

    /// Crossing the runway threshold (IAS)
    VThrshld,

    /// Crossing the runway threshold (AGL altitude)
    /// Always latched together with `VThrshld`
    AltThrshld,

    /// Sustained ground contact (IAS at the start of the interval)
    VTouchdown,
}

impl EventKind {
    /// All kinds in canonical order
    pub const ALL: [EventKind; 6] = [
        EventKind::VFe40,
        EventKind::VLg,
        EventKind::VFe100,
        EventKind::VThrshld,
        EventKind::AltThrshld,
        EventKind::VTouchdown,
    ];

    /// Short event code
    pub fn code(&self) -> &'static str {
        match self {
            EventKind::VFe40 => "VFe40",
            EventKind::VLg => "VLg",
            EventKind::VFe100 => "VFe100",
            EventKind::VThrshld => "VThrshld",
            EventKind::AltThrshld => "AltThrshld",
            EventKind::VTouchdown => "VTouchdown",
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        EventKind::ALL.iter().copied().find(|kind| kind.code() == s)
    }

    /// Human-readable label for display
    pub fn description(&self) -> &'static str {
        match self {
            EventKind::VFe40 => "Flap Extension 40% (IAS)",
            EventKind::VLg => "Landing Gear Extension (IAS)",
            EventKind::VFe100 => "Flap Extension 100% (IAS)",
            EventKind::VThrshld => "Runway Threshold (IAS)",
            EventKind::AltThrshld => "Runway Threshold (Alt)",
            EventKind::VTouchdown => "Landing (IAS)",
        }
    }

    /// Display ordering hint, never used by detection
    pub fn sequence_rank(&self) -> u32 {
        match self {
            EventKind::VFe40 => 1,
            EventKind::VLg => 2,
            EventKind::VFe100 => 3,
            EventKind::VThrshld | EventKind::AltThrshld => 4,
            EventKind::VTouchdown => 5,
        }
    }

    /// Position within `ALL`
    pub fn index(&self) -> usize {
        match self {
            EventKind::VFe40 => 0,
            EventKind::VLg => 1,
            EventKind::VFe100 => 2,
            EventKind::VThrshld => 3,
            EventKind::AltThrshld => 4,
            EventKind::VTouchdown => 5,
        }
    }
}

/// One detected (or still pending) event of a flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,

    /// Short code, e.g. `VFe40`
    pub name: String,

    /// Human label, taken from the event definition
    pub description: String,

    /// Display ordering hint
    pub sequence_rank: u32,

    /// Absolute time of occurrence in ticks
    pub time: u64,

    /// Raw attribute value at the occurrence
    pub raw_value: f64,

    /// Raw value normalized against the event definition's bounds
    pub normalized_value: f64,

    /// Whether the event was observed in the flight
    pub found: bool,
}

impl Event {
    /// Event slot that has not been observed yet
    pub fn pending(kind: EventKind, definitions: &EventDefinitions) -> Self {
        Event {
            kind,
            name: kind.code().to_string(),
            description: definitions.get(kind).label.clone(),
            sequence_rank: kind.sequence_rank(),
            time: 0,
            raw_value: 0.0,
            normalized_value: 0.0,
            found: false,
        }
    }
}

/// The six events of one flight, in canonical order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSet {
    pub series_id: String,
    events: Vec<Event>,
}

impl EventSet {
    /// Six pending events
    pub fn pending(series_id: impl Into<String>, definitions: &EventDefinitions) -> Self {
        EventSet {
            series_id: series_id.into(),
            events: EventKind::ALL
                .iter()
                .map(|kind| Event::pending(*kind, definitions))
                .collect(),
        }
    }

    /// Rebuild a set from stored events, filling missing kinds as pending
    pub fn from_events(
        series_id: impl Into<String>,
        stored: Vec<Event>,
        definitions: &EventDefinitions,
    ) -> Self {
        let mut set = EventSet::pending(series_id, definitions);
        for event in stored {
            let idx = event.kind.index();
            set.events[idx] = event;
        }
        set
    }

    pub fn get(&self, kind: EventKind) -> &Event {
        &self.events[kind.index()]
    }

    pub(crate) fn get_mut(&mut self, kind: EventKind) -> &mut Event {
        &mut self.events[kind.index()]
    }

    pub fn is_found(&self, kind: EventKind) -> bool {
        self.get(kind).found
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Events that were observed
    pub fn found(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|e| e.found)
    }

    pub fn found_count(&self) -> usize {
        self.found().count()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
