//! Duration reconstruction.
//!
//! Turns one entity's point events into accumulated time per state.
//! Each state event opens an interval that lasts until the entity's next
//! event of any type; the interval is credited to the earlier event's
//! state. The final event closes nothing, so it contributes no time.
//! Counter events add their `count` to the unit total and open no state.

use std::cmp::Ordering;

use crate::model::event::{Event, EventType};

/// Accumulated time per state (seconds, unrounded) and unit total.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Durations {
    pub working_seconds: f64,
    pub idle_seconds: f64,
    pub absent_seconds: f64,
    pub total_units: i64,
}

impl Durations {
    fn credit(&mut self, event_type: EventType, seconds: f64) {
        match event_type {
            EventType::Working => self.working_seconds += seconds,
            EventType::Idle => self.idle_seconds += seconds,
            EventType::Absent => self.absent_seconds += seconds,
            EventType::ProductCount => {}
        }
    }
}

/// Total order used for reconstruction. Ties on timestamp are broken on the
/// identity fields so that the result does not depend on arrival order.
fn timeline_order(a: &Event, b: &Event) -> Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.event_type.cmp(&b.event_type))
        .then_with(|| a.workstation_id.cmp(&b.workstation_id))
        .then_with(|| a.worker_id.cmp(&b.worker_id))
        .then_with(|| a.count.cmp(&b.count))
}

/// Sort one entity's events into timeline order. Caller ordering is never trusted.
pub fn sort_timeline<'a>(events: impl IntoIterator<Item = &'a Event>) -> Vec<&'a Event> {
    let mut sorted: Vec<&Event> = events.into_iter().collect();
    sorted.sort_by(|a, b| timeline_order(a, b));
    sorted
}

/// Reconstruct durations for one entity.
pub fn reconstruct<'a>(events: impl IntoIterator<Item = &'a Event>) -> Durations {
    reconstruct_sorted(&sort_timeline(events))
}

/// Reconstruct from events already in timeline order.
pub(crate) fn reconstruct_sorted(timeline: &[&Event]) -> Durations {
    let mut durations = Durations::default();

    for event in timeline {
        if !event.event_type.is_state() {
            durations.total_units = durations.total_units.saturating_add(event.count.max(0));
        }
    }

    for pair in timeline.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        let gap_ms = (next.timestamp - current.timestamp).num_milliseconds();
        // Ties and clock anomalies contribute nothing.
        if gap_ms <= 0 || !current.event_type.is_state() {
            continue;
        }
        durations.credit(current.event_type, gap_ms as f64 / 1000.0);
    }

    durations
}

/// Seconds between the first and last event of a sorted timeline.
pub(crate) fn span_seconds(timeline: &[&Event]) -> f64 {
    match (timeline.first(), timeline.last()) {
        (Some(first), Some(last)) if timeline.len() > 1 => {
            (last.timestamp - first.timestamp).num_milliseconds().max(0) as f64 / 1000.0
        }
        _ => 0.0,
    }
}
