//! Integration tests for telemetry initialization and span helpers.

use std::time::Duration;

use floorwatch::config::Config;
use floorwatch::model::event::IngestSummary;
use floorwatch::telemetry::span::{
    record_event_count, record_ingest_outcome, start_ingest_span, start_metrics_span,
};
use floorwatch::telemetry::{TelemetryConfig, init_telemetry, metrics};
use opentelemetry::KeyValue;
use secrecy::SecretString;

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process; a second
    // init in the same binary returns Err, which is acceptable here.
    let config = TelemetryConfig {
        endpoint: None,
        service_name: "floorwatch-test".to_string(),
        log_level: "debug".to_string(),
    };
    if let Ok(guard) = init_telemetry(config) {
        assert!(!guard.is_exporting());
    }
}

#[test]
fn telemetry_config_follows_service_config() {
    let config = Config {
        database_url: SecretString::from("postgres://localhost/floor"),
        otel_endpoint: Some("http://localhost:4317".to_string()),
        log_level: "warn".to_string(),
        cache_retention_days: 90,
        alert_threshold: 0.75,
        heartbeat_interval: Duration::from_secs(30),
        subscriber_buffer: 64,
        ingest_chunk_size: 500,
    };

    let telemetry = TelemetryConfig::from_config(&config, "floorwatch");
    assert_eq!(telemetry.endpoint.as_deref(), Some("http://localhost:4317"));
    assert_eq!(telemetry.service_name, "floorwatch");
    assert_eq!(telemetry.log_level, "warn");
}

#[test]
fn ingest_span_records_outcome() {
    let span = start_ingest_span(3);
    let _enter = span.enter();
    record_ingest_outcome(
        &span,
        &IngestSummary {
            inserted: 2,
            skipped: 1,
            total: 3,
        },
    );
}

#[test]
fn metrics_span_accepts_all_entities() {
    let span = start_metrics_span("worker", None);
    record_event_count(&span, 42);

    let span = start_metrics_span("workstation", Some("S1"));
    record_event_count(&span, 0);
}

#[test]
fn instruments_record_without_provider() {
    metrics::events_ingested().add(3, &[KeyValue::new("result", "inserted")]);
    metrics::ingest_batches().add(1, &[KeyValue::new("result", "ok")]);
    metrics::cache_lookups().add(1, &[KeyValue::new("result", "miss")]);
    metrics::notify_deliveries().add(2, &[KeyValue::new("result", "delivered")]);
    metrics::notify_subscribers().add(1, &[]);
    metrics::operation_duration_ms().record(1.5, &[KeyValue::new("operation", "test")]);
}
