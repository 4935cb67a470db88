//! Messages pushed to notification subscribers.
//!
//! Wire form is `{"type": ..., "payload": ...}` so consumers can switch
//! on the tag without knowing every variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::event::IngestSummary;

/// A message delivered to every live subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Notification {
    /// A batch was durably stored.
    #[serde(rename = "events:ingested")]
    EventsIngested(IngestSummary),
    /// Keep-alive on an otherwise idle channel.
    #[serde(rename = "heartbeat")]
    Heartbeat { at: DateTime<Utc> },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::EventsIngested(_) => "events:ingested",
            Notification::Heartbeat { .. } => "heartbeat",
        }
    }
}
