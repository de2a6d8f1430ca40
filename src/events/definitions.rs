// Event definitions
// Static reference bands per event kind, supplied once at detector construction

use serde::{Deserialize, Serialize};

use crate::events::types::EventKind;
use crate::normalize::normalize;

/// Reference bounds (raw units) and label for one event kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDefinition {
    /// Label shown next to the event
    pub label: String,

    /// Lower reference bound in raw units
    pub min_value: f64,

    /// Upper reference bound in raw units
    pub max_value: f64,
}

impl EventDefinition {
    pub fn new(label: impl Into<String>, min_value: f64, max_value: f64) -> Self {
        EventDefinition {
            label: label.into(),
            min_value,
            max_value,
        }
    }

    /// Normalize a raw value against this definition's bounds
    pub fn normalize(&self, value: f64) -> f64 {
        normalize(value, self.min_value, self.max_value)
    }

    pub fn is_valid(&self) -> bool {
        self.min_value.is_finite() && self.max_value.is_finite() && self.min_value < self.max_value
    }
}

/// Reference band of one event projected onto a display scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceBand {
    pub kind: EventKind,
    pub label: String,
    pub min_value: f64,
    pub max_value: f64,
    pub normalized_min: f64,
    pub normalized_max: f64,
}

/// The six event definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventDefinitions {
    pub vfe40: EventDefinition,
    pub vlg: EventDefinition,
    pub vfe100: EventDefinition,
    pub vthrshld: EventDefinition,
    pub alt_thrshld: EventDefinition,
    pub vtouchdown: EventDefinition,
}

impl Default for EventDefinitions {
    fn default() -> Self {
        // Light single-engine reference speeds (kts) and threshold height (ft)
        EventDefinitions {
            vfe40: EventDefinition::new(EventKind::VFe40.description(), 60.0, 140.0),
            vlg: EventDefinition::new(EventKind::VLg.description(), 60.0, 140.0),
            vfe100: EventDefinition::new(EventKind::VFe100.description(), 50.0, 110.0),
            vthrshld: EventDefinition::new(EventKind::VThrshld.description(), 50.0, 100.0),
            alt_thrshld: EventDefinition::new(EventKind::AltThrshld.description(), 0.0, 100.0),
            vtouchdown: EventDefinition::new(EventKind::VTouchdown.description(), 40.0, 80.0),
        }
    }
}

impl EventDefinitions {
    pub fn get(&self, kind: EventKind) -> &EventDefinition {
        match kind {
            EventKind::VFe40 => &self.vfe40,
            EventKind::VLg => &self.vlg,
            EventKind::VFe100 => &self.vfe100,
            EventKind::VThrshld => &self.vthrshld,
            EventKind::AltThrshld => &self.alt_thrshld,
            EventKind::VTouchdown => &self.vtouchdown,
        }
    }

    /// Kinds whose bounds are missing, inverted or zero-width
    pub fn invalid_kinds(&self) -> Vec<EventKind> {
        EventKind::ALL
            .iter()
            .copied()
            .filter(|kind| !self.get(*kind).is_valid())
            .collect()
    }

    /// Project every reference band onto a display scale `[scale_min, scale_max]`
    /// Used by renderers to draw min/max lines next to normalized events
    pub fn bands_on_scale(&self, scale_min: f64, scale_max: f64) -> Vec<ReferenceBand> {
        EventKind::ALL
            .iter()
            .map(|kind| {
                let def = self.get(*kind);
                ReferenceBand {
                    kind: *kind,
                    label: def.label.clone(),
                    min_value: def.min_value,
                    max_value: def.max_value,
                    normalized_min: normalize(def.min_value, scale_min, scale_max),
                    normalized_max: normalize(def.max_value, scale_min, scale_max),
                }
            })
            .collect()
    }

    /// Lowest minimum and highest maximum over all definitions
    pub fn value_range(&self) -> (f64, f64) {
        EventKind::ALL
            .iter()
            .map(|kind| self.get(*kind))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), def| {
                (lo.min(def.min_value), hi.max(def.max_value))
            })
    }
}

