// Event timeline
// Diagnostic view of found events with the spacing between sequence steps

use serde::{Deserialize, Serialize};

use crate::events::types::{EventKind, EventSet};
use crate::series::TICKS_PER_SECOND;

/// One found event placed on the flight's time axis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub kind: EventKind,
    pub time: u64,
    pub raw_value: f64,

    /// Ticks since the closest event of a lower sequence rank, if any
    pub delta_ticks: Option<i64>,

    pub summary: String,
}

/// Found events of one flight ordered by time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTimeline {
    pub series_id: String,
    pub entries: Vec<TimelineEntry>,
}

impl EventTimeline {
    pub fn from_events(events: &EventSet) -> Self {
        let mut found: Vec<_> = events.found().collect();
        found.sort_by_key(|e| (e.time, e.sequence_rank));

        let entries = found
            .iter()
            .map(|event| {
                // Latest preceding step in the sequence
                let previous = events
                    .found()
                    .filter(|other| other.sequence_rank < event.sequence_rank)
                    .max_by_key(|other| (other.sequence_rank, other.time));

                let delta_ticks = previous.map(|p| event.time as i64 - p.time as i64);

                let mut summary = format!(
                    "{} at {:.1}s, value {:.2}",
                    event.description,
                    event.time as f64 / TICKS_PER_SECOND as f64,
                    event.raw_value
                );
                if let (Some(p), Some(delta)) = (previous, delta_ticks) {
                    summary.push_str(&format!(
                        " ({:+.1}s after {})",
                        delta as f64 / TICKS_PER_SECOND as f64,
                        p.name
                    ));
                }

                TimelineEntry {
                    kind: event.kind,
                    time: event.time,
                    raw_value: event.raw_value,
                    delta_ticks,
                    summary,
                }
            })
            .collect();

        EventTimeline {
            series_id: events.series_id.clone(),
            entries,
        }
    }

    pub fn log(&self) {
        if self.entries.is_empty() {
            log::debug!("{}: no events found", self.series_id);
            return;
        }
        log::debug!("{}", self.series_id);
        for entry in &self.entries {
            log::debug!("   {}", entry.summary);
        }
    }
}
