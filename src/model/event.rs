//! Perception events and the ingestion payload.
//!
//! A `RawEvent` is what the producer sends. Validation turns it into a
//! `NewEvent` (normalized timestamp, defaults applied, fingerprint
//! computed). The store assigns an id and returns `Event`s on read.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::fingerprint::fingerprint;

/// Model version recorded when the producer does not send one.
pub const DEFAULT_MODEL_VERSION: &str = "baseline";

// ---------------------------------------------------------------------------
// Event type
// ---------------------------------------------------------------------------

/// What an event asserts about the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// State: the worker is actively working.
    Working,
    /// State: the worker is present but not working.
    Idle,
    /// State: nobody is at the station.
    Absent,
    /// Counter: `count` units were produced. Not a state.
    ProductCount,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Working => "working",
            EventType::Idle => "idle",
            EventType::Absent => "absent",
            EventType::ProductCount => "product_count",
        }
    }

    /// State events open an interval; counters do not.
    pub fn is_state(self) -> bool {
        !matches!(self, EventType::ProductCount)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "working" => Ok(EventType::Working),
            "idle" => Ok(EventType::Idle),
            "absent" => Ok(EventType::Absent),
            "product_count" => Ok(EventType::ProductCount),
            other => Err(Error::Other(format!("unknown event type: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Stored event
// ---------------------------------------------------------------------------

/// An event as persisted. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub worker_id: String,
    pub workstation_id: String,
    pub event_type: EventType,
    pub confidence: f64,
    pub count: i64,
    pub model_version: String,
    pub dedup_key: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// New event (validated, not yet stored)
// ---------------------------------------------------------------------------

/// A validated event ready for insertion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEvent {
    pub timestamp: DateTime<Utc>,
    pub worker_id: String,
    pub workstation_id: String,
    pub event_type: EventType,
    pub confidence: f64,
    pub count: i64,
    pub model_version: String,
    pub dedup_key: String,
}

impl NewEvent {
    /// Build an event with default confidence, count and model version.
    ///
    /// The timestamp is truncated to millisecond precision so that the
    /// stored instant is exactly the one that was fingerprinted.
    pub fn new(
        timestamp: DateTime<Utc>,
        worker_id: impl Into<String>,
        workstation_id: impl Into<String>,
        event_type: EventType,
    ) -> Self {
        let timestamp = timestamp.trunc_subsecs(3);
        let worker_id = worker_id.into();
        let workstation_id = workstation_id.into();
        let dedup_key = fingerprint(&timestamp, &worker_id, &workstation_id, event_type);
        Self {
            timestamp,
            worker_id,
            workstation_id,
            event_type,
            confidence: 1.0,
            count: 0,
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            dedup_key,
        }
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn count(mut self, count: i64) -> Self {
        self.count = count;
        self
    }

    pub fn model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = version.into();
        self
    }

    /// Materialize as a stored event (used by stores that assign ids in-process).
    pub fn into_event(self, id: Uuid, created_at: DateTime<Utc>) -> Event {
        Event {
            id,
            timestamp: self.timestamp,
            worker_id: self.worker_id,
            workstation_id: self.workstation_id,
            event_type: self.event_type,
            confidence: self.confidence,
            count: self.count,
            model_version: self.model_version,
            dedup_key: self.dedup_key,
            created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire payload
// ---------------------------------------------------------------------------

/// One event as sent by the producer, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub workstation_id: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub model_version: Option<String>,
}

impl RawEvent {
    /// Validate and normalize. `index` is the position in the batch, used
    /// for field-level error reporting.
    pub fn validate(&self, index: usize) -> Result<NewEvent> {
        let raw_ts = required(index, "timestamp", &self.timestamp)?;
        let timestamp = DateTime::parse_from_rfc3339(raw_ts)
            .map_err(|e| Error::validation(index, "timestamp", format!("{raw_ts:?}: {e}")))?
            .with_timezone(&Utc);

        let worker_id = required(index, "worker_id", &self.worker_id)?;
        let workstation_id = required(index, "workstation_id", &self.workstation_id)?;
        let event_type: EventType = required(index, "event_type", &self.event_type)?
            .parse()
            .map_err(|e: Error| Error::validation(index, "event_type", e.to_string()))?;

        let confidence = self.confidence.unwrap_or(1.0);
        if !(0.0..=1.0).contains(&confidence) {
            return Err(Error::validation(
                index,
                "confidence",
                format!("{confidence} is outside [0, 1]"),
            ));
        }

        let count = self.count.unwrap_or(0);
        if count < 0 {
            return Err(Error::validation(index, "count", format!("{count} is negative")));
        }

        let mut event = NewEvent::new(timestamp, worker_id, workstation_id, event_type)
            .confidence(confidence)
            .count(count);
        if let Some(version) = self.model_version.as_deref().filter(|v| !v.trim().is_empty()) {
            event = event.model_version(version);
        }
        Ok(event)
    }
}

fn required<'a>(index: usize, field: &'static str, value: &'a Option<String>) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        Some(_) => Err(Error::validation(index, field, "must not be empty")),
        None => Err(Error::validation(index, field, "is required")),
    }
}

/// Ingestion body: a single event or an array of events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Batch(Vec<RawEvent>),
    Single(RawEvent),
}

impl Payload {
    pub fn into_events(self) -> Vec<RawEvent> {
        match self {
            Payload::Batch(events) => events,
            Payload::Single(event) => vec![event],
        }
    }
}

impl From<Vec<RawEvent>> for Payload {
    fn from(events: Vec<RawEvent>) -> Self {
        Payload::Batch(events)
    }
}

// ---------------------------------------------------------------------------
// Ingestion result
// ---------------------------------------------------------------------------

/// Outcome of one ingestion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IngestSummary {
    pub inserted: u64,
    pub skipped: u64,
    pub total: u64,
}
