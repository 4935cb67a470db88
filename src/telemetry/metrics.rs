//! Metric instrument factories for floorwatch.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments come from the meter named after the crate's instrumentation scope.

use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};

fn meter() -> Meter {
    opentelemetry::global::meter(super::SCOPE)
}

/// Counter: events processed by ingestion.
/// Labels: `result` ("inserted" | "skipped").
pub fn events_ingested() -> Counter<u64> {
    meter()
        .u64_counter("floorwatch.events.ingested")
        .with_description("Events processed by ingestion")
        .build()
}

/// Counter: ingestion calls.
/// Labels: `result` ("ok" | "empty" | "invalid" | "error").
pub fn ingest_batches() -> Counter<u64> {
    meter()
        .u64_counter("floorwatch.ingest.batches")
        .with_description("Ingestion batches by outcome")
        .build()
}

/// Counter: metrics cache lookups.
/// Labels: `entity_type`, `result` ("hit" | "miss").
pub fn cache_lookups() -> Counter<u64> {
    meter()
        .u64_counter("floorwatch.cache.lookups")
        .with_description("Metrics cache lookups")
        .build()
}

/// Counter: notification deliveries.
/// Labels: `kind`, `result` ("delivered" | "dropped").
pub fn notify_deliveries() -> Counter<u64> {
    meter()
        .u64_counter("floorwatch.notify.deliveries")
        .with_description("Notification deliveries to subscribers")
        .build()
}

/// Up-down counter: live notification subscribers.
pub fn notify_subscribers() -> UpDownCounter<i64> {
    meter()
        .i64_up_down_counter("floorwatch.notify.subscribers")
        .with_description("Live notification subscribers")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `operation`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("floorwatch.operation.duration_ms")
        .with_description("Operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
