use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use floorwatch::error::{Error, Result};
use floorwatch::ingest::{Ingestor, validate_all};
use floorwatch::model::analytics::{DailyUnits, ModelVersionStats};
use floorwatch::model::event::{
    DEFAULT_MODEL_VERSION, Event, EventType, IngestSummary, NewEvent, Payload, RawEvent,
};
use floorwatch::notify::{Notification, Notifier};
use floorwatch::store::{EventFilter, EventQuery, EventStore, InsertOutcome, MemoryStore};

fn raw(timestamp: &str, worker: &str, event_type: &str) -> RawEvent {
    RawEvent {
        timestamp: Some(timestamp.to_string()),
        worker_id: Some(worker.to_string()),
        workstation_id: Some("S1".to_string()),
        event_type: Some(event_type.to_string()),
        ..RawEvent::default()
    }
}

fn batch() -> Vec<RawEvent> {
    vec![
        raw("2026-01-15T08:00:00Z", "W1", "working"),
        raw("2026-01-15T09:30:00Z", "W1", "idle"),
        RawEvent {
            count: Some(3),
            ..raw("2026-01-15T09:00:00Z", "W1", "product_count")
        },
    ]
}

fn setup() -> (Arc<MemoryStore>, Arc<Notifier>, Ingestor) {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(Notifier::default());
    let ingestor = Ingestor::new(store.clone(), notifier.clone());
    (store, notifier, ingestor)
}

#[tokio::test]
async fn resubmitting_a_batch_is_idempotent() {
    let (store, _notifier, ingestor) = setup();

    let first = ingestor.ingest(batch().into()).await.unwrap();
    assert_eq!(
        first,
        IngestSummary {
            inserted: 3,
            skipped: 0,
            total: 3
        }
    );

    let second = ingestor.ingest(batch().into()).await.unwrap();
    assert_eq!(
        second,
        IngestSummary {
            inserted: 0,
            skipped: 3,
            total: 3
        }
    );

    assert_eq!(store.count(&EventFilter::default()).await.unwrap(), 3);
}

#[tokio::test]
async fn equivalent_timestamps_collapse_to_one_event() {
    let (store, _notifier, ingestor) = setup();

    let summary = ingestor
        .ingest(
            vec![
                raw("2026-01-15T08:00:00Z", "W1", "working"),
                raw("2026-01-15T10:00:00+02:00", "W1", "working"),
                raw("2026-01-15T08:00:00.000Z", "W1", "working"),
            ]
            .into(),
        )
        .await
        .unwrap();

    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(store.count(&EventFilter::default()).await.unwrap(), 1);
}

#[tokio::test]
async fn counter_readings_at_the_same_instant_collide() {
    let (_store, _notifier, ingestor) = setup();

    let summary = ingestor
        .ingest(
            vec![
                RawEvent {
                    count: Some(2),
                    ..raw("2026-01-15T08:00:00Z", "W1", "product_count")
                },
                RawEvent {
                    count: Some(7),
                    ..raw("2026-01-15T08:00:00Z", "W1", "product_count")
                },
            ]
            .into(),
        )
        .await
        .unwrap();

    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn empty_payload_is_rejected() {
    let (_store, _notifier, ingestor) = setup();

    let result = ingestor.ingest(Payload::Batch(Vec::new())).await;
    assert!(matches!(result, Err(Error::EmptyPayload)));
}

#[tokio::test]
async fn invalid_candidate_rejects_whole_batch() {
    let (store, _notifier, ingestor) = setup();

    let mut events = batch();
    events.push(RawEvent {
        confidence: Some(1.5),
        ..raw("2026-01-15T11:00:00Z", "W1", "working")
    });

    match ingestor.ingest(events.into()).await {
        Err(Error::Validation { index, field, .. }) => {
            assert_eq!(index, 3);
            assert_eq!(field, "confidence");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(store.count(&EventFilter::default()).await.unwrap(), 0);
}

#[test]
fn validation_reports_the_offending_field() {
    let cases = [
        (
            RawEvent {
                timestamp: None,
                ..raw("x", "W1", "working")
            },
            "timestamp",
        ),
        (raw("yesterday", "W1", "working"), "timestamp"),
        (raw("2026-01-15T08:00:00Z", "  ", "working"), "worker_id"),
        (
            RawEvent {
                workstation_id: None,
                ..raw("2026-01-15T08:00:00Z", "W1", "working")
            },
            "workstation_id",
        ),
        (raw("2026-01-15T08:00:00Z", "W1", "sleeping"), "event_type"),
        (
            RawEvent {
                count: Some(-1),
                ..raw("2026-01-15T08:00:00Z", "W1", "product_count")
            },
            "count",
        ),
    ];

    for (candidate, expected) in cases {
        match validate_all(&[candidate]) {
            Err(Error::Validation { field, .. }) => assert_eq!(field, expected),
            other => panic!("expected {expected} error, got {other:?}"),
        }
    }
}

#[test]
fn validation_applies_defaults() {
    let events = validate_all(&[raw("2026-01-15T08:00:00Z", "W1", "working")]).unwrap();
    let event = &events[0];
    assert_eq!(event.confidence, 1.0);
    assert_eq!(event.count, 0);
    assert_eq!(event.model_version, DEFAULT_MODEL_VERSION);
    assert_eq!(event.event_type, EventType::Working);
}

#[test]
fn payload_accepts_object_or_array() {
    let single: Payload = serde_json::from_str(
        r#"{"timestamp":"2026-01-15T08:00:00Z","worker_id":"W1","workstation_id":"S1","event_type":"idle"}"#,
    )
    .unwrap();
    assert_eq!(single.into_events().len(), 1);

    let many: Payload = serde_json::from_str(
        r#"[{"timestamp":"2026-01-15T08:00:00Z","worker_id":"W1","workstation_id":"S1","event_type":"idle"},
            {"timestamp":"2026-01-15T08:05:00Z","worker_id":"W1","workstation_id":"S1","event_type":"working","confidence":0.9}]"#,
    )
    .unwrap();
    assert_eq!(many.into_events().len(), 2);
}

#[tokio::test]
async fn subscribers_hear_about_new_events_only() {
    let (_store, notifier, ingestor) = setup();
    let mut subscription = notifier.subscribe().await;

    let summary = ingestor.ingest(batch().into()).await.unwrap();
    assert_eq!(
        subscription.try_recv(),
        Some(Notification::EventsIngested(summary))
    );

    // All duplicates: nothing new, so nothing is announced.
    ingestor.ingest(batch().into()).await.unwrap();
    assert_eq!(subscription.try_recv(), None);
}

/// Stores two events, then loses the connection.
struct FlakyStore;

#[async_trait]
impl EventStore for FlakyStore {
    async fn insert_many(&self, _events: &[NewEvent]) -> Result<InsertOutcome> {
        Err(Error::PartialIngest {
            inserted: 2,
            skipped: 0,
            source: Box::new(Error::Other("connection reset".to_string())),
        })
    }

    async fn find(&self, _query: &EventQuery) -> Result<Vec<Event>> {
        Ok(Vec::new())
    }

    async fn count(&self, _filter: &EventFilter) -> Result<u64> {
        Ok(0)
    }

    async fn daily_units(&self, _filter: &EventFilter) -> Result<Vec<DailyUnits>> {
        Ok(Vec::new())
    }

    async fn event_days(&self, _filter: &EventFilter) -> Result<Vec<NaiveDate>> {
        Ok(Vec::new())
    }

    async fn model_versions(&self) -> Result<Vec<ModelVersionStats>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn partial_ingest_reports_counts_and_still_notifies() {
    let notifier = Arc::new(Notifier::default());
    let mut subscription = notifier.subscribe().await;
    let ingestor = Ingestor::new(Arc::new(FlakyStore), notifier.clone());

    match ingestor.ingest(batch().into()).await {
        Err(Error::PartialIngest {
            inserted, skipped, ..
        }) => {
            assert_eq!(inserted, 2);
            assert_eq!(skipped, 0);
        }
        other => panic!("expected partial ingest, got {other:?}"),
    }

    assert_eq!(
        subscription.try_recv(),
        Some(Notification::EventsIngested(IngestSummary {
            inserted: 2,
            skipped: 0,
            total: 3
        }))
    );
}

#[tokio::test]
async fn stored_events_keep_their_fingerprint() {
    let (store, _notifier, ingestor) = setup();
    ingestor.ingest(batch().into()).await.unwrap();

    let expected = validate_all(&batch()).unwrap();
    let stored = store
        .find(&EventQuery::new(EventFilter::default()))
        .await
        .unwrap();
    for event in &expected {
        assert!(stored.iter().any(|s| s.dedup_key == event.dedup_key));
    }
}
