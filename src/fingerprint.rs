//! Dedup key generation.
//!
//! The key is a SHA-256 over the event's identity fields. `count` and
//! `confidence` are not part of the identity: two counter readings for the
//! same worker, station and millisecond collide and the second is dropped.
//! Producers of rapid counters must keep timestamps unique.

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::model::event::EventType;

/// Canonical timestamp form fed to the hash: RFC 3339, UTC `Z`, millisecond precision.
pub fn canonical_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Deterministic, unsalted fingerprint of an event's identity.
pub fn fingerprint(
    timestamp: &DateTime<Utc>,
    worker_id: &str,
    workstation_id: &str,
    event_type: EventType,
) -> String {
    let material = format!(
        "{}|{}|{}|{}",
        canonical_timestamp(timestamp),
        worker_id,
        workstation_id,
        event_type.as_str()
    );
    hex::encode(Sha256::digest(material.as_bytes()))
}
