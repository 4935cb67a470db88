//! Span helpers for ingestion and metrics computation.

use tracing::Span;

use crate::model::event::IngestSummary;

/// Start a span for one ingestion batch.
///
/// Outcome fields are declared empty and filled by [`record_ingest_outcome`].
pub fn start_ingest_span(batch_size: usize) -> Span {
    tracing::info_span!(
        "ingest.batch",
        "batch.size" = batch_size,
        "batch.inserted" = tracing::field::Empty,
        "batch.skipped" = tracing::field::Empty,
    )
}

pub fn record_ingest_outcome(span: &Span, summary: &IngestSummary) {
    span.record("batch.inserted", summary.inserted);
    span.record("batch.skipped", summary.skipped);
}

/// Start a span for a metrics computation.
///
/// `entity` is the requested id, or `"*"` for all entities.
pub fn start_metrics_span(kind: &str, entity: Option<&str>) -> Span {
    tracing::info_span!(
        "metrics.compute",
        "metrics.kind" = kind,
        "metrics.entity" = entity.unwrap_or("*"),
        "metrics.events" = tracing::field::Empty,
    )
}

pub fn record_event_count(span: &Span, events: usize) {
    span.record("metrics.events", events);
}
