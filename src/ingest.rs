//! Ingestion pipeline: validate, fingerprint, store, notify.
//!
//! Ingestion is idempotent. Resubmitting a batch converges on the same
//! stored set; already-known events come back as `skipped`.

use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use tracing::{Instrument, error, info, warn};

use crate::error::{Error, Result};
use crate::model::event::{IngestSummary, NewEvent, Payload, RawEvent};
use crate::notify::Notifier;
use crate::store::EventStore;
use crate::telemetry::metrics;
use crate::telemetry::span::{record_ingest_outcome, start_ingest_span};

pub struct Ingestor {
    store: Arc<dyn EventStore>,
    notifier: Arc<Notifier>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn EventStore>, notifier: Arc<Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Ingest a producer payload (one event or an array).
    pub async fn ingest(&self, payload: Payload) -> Result<IngestSummary> {
        self.ingest_raw(payload.into_events()).await
    }

    /// Validate every candidate, then store the batch. Validation failures
    /// reject the whole batch before anything is written.
    pub async fn ingest_raw(&self, candidates: Vec<RawEvent>) -> Result<IngestSummary> {
        if candidates.is_empty() {
            metrics::ingest_batches().add(1, &[KeyValue::new("result", "empty")]);
            return Err(Error::EmptyPayload);
        }

        let events = match validate_all(&candidates) {
            Ok(events) => events,
            Err(e) => {
                metrics::ingest_batches().add(1, &[KeyValue::new("result", "invalid")]);
                warn!(batch = candidates.len(), "rejected batch: {e}");
                return Err(e);
            }
        };

        self.ingest_events(events).await
    }

    /// Store already-validated events.
    pub async fn ingest_events(&self, events: Vec<NewEvent>) -> Result<IngestSummary> {
        if events.is_empty() {
            metrics::ingest_batches().add(1, &[KeyValue::new("result", "empty")]);
            return Err(Error::EmptyPayload);
        }

        let span = start_ingest_span(events.len());
        let started = Instant::now();
        let total = events.len() as u64;

        let result = self.store.insert_many(&events).instrument(span.clone()).await;

        metrics::operation_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", "ingest.batch")],
        );

        match result {
            Ok(outcome) => {
                let summary = IngestSummary {
                    inserted: outcome.inserted,
                    skipped: outcome.skipped,
                    total,
                };
                record_ingest_outcome(&span, &summary);
                record_counts(&summary);
                metrics::ingest_batches().add(1, &[KeyValue::new("result", "ok")]);
                span.in_scope(|| {
                    info!(
                        inserted = summary.inserted,
                        skipped = summary.skipped,
                        total,
                        "batch ingested"
                    );
                });

                if summary.inserted > 0 {
                    self.notifier.events_ingested(summary).await;
                }
                Ok(summary)
            }
            Err(Error::PartialIngest {
                inserted,
                skipped,
                source,
            }) => {
                let summary = IngestSummary {
                    inserted,
                    skipped,
                    total,
                };
                record_ingest_outcome(&span, &summary);
                record_counts(&summary);
                metrics::ingest_batches().add(1, &[KeyValue::new("result", "error")]);
                span.in_scope(|| {
                    error!(inserted, skipped, total, "batch partially ingested: {source}");
                });

                // What did persist is real and observers should hear about it.
                if inserted > 0 {
                    self.notifier.events_ingested(summary).await;
                }
                Err(Error::PartialIngest {
                    inserted,
                    skipped,
                    source,
                })
            }
            Err(e) => {
                metrics::ingest_batches().add(1, &[KeyValue::new("result", "error")]);
                span.in_scope(|| error!(total, "batch ingest failed: {e}"));
                Err(e)
            }
        }
    }
}

/// Validate a batch. Stops at the first invalid candidate.
pub fn validate_all(candidates: &[RawEvent]) -> Result<Vec<NewEvent>> {
    candidates
        .iter()
        .enumerate()
        .map(|(index, raw)| raw.validate(index))
        .collect()
}

fn record_counts(summary: &IngestSummary) {
    let counter = metrics::events_ingested();
    counter.add(summary.inserted, &[KeyValue::new("result", "inserted")]);
    counter.add(summary.skipped, &[KeyValue::new("result", "skipped")]);
}
