//! Metrics cache: daily buckets consulted before live aggregation.
//!
//! The cache is an accelerator, never the source of truth. A lookup either
//! returns the full cached series for a query or nothing at all; callers
//! fall back to recomputing from raw events. Buckets older than the
//! retention window are ignored and eventually purged.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use opentelemetry::KeyValue;
use tracing::{debug, info};

use crate::aggregate::MetricsEngine;
use crate::error::Result;
use crate::model::cache::{
    BucketQuery, EntityType, FACTORY_ENTITY_ID, MetricsBucket, TimeSeriesPoint,
};
use crate::model::{round2, round_secs};
use crate::store::{CacheStore, EventFilter, TimeWindow};
use crate::telemetry::metrics;

/// Default bucket retention.
pub const DEFAULT_RETENTION_DAYS: i64 = 90;

/// A time-series request for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesQuery {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub window: TimeWindow,
}

impl SeriesQuery {
    pub fn new(entity_type: EntityType, entity_id: impl Into<String>, window: TimeWindow) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
            window,
        }
    }

    /// Day-granular view of the window used against the cache.
    pub fn bucket_query(&self) -> BucketQuery {
        BucketQuery {
            entity_type: self.entity_type,
            entity_id: self.entity_id.clone(),
            from: self.window.from.map(|t| t.date_naive()),
            to: self.window.to.map(|t| t.date_naive()),
        }
    }
}

pub struct MetricsCache {
    store: Arc<dyn CacheStore>,
    retention: TimeDelta,
}

impl MetricsCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_retention_days(store, DEFAULT_RETENTION_DAYS)
    }

    pub fn with_retention_days(store: Arc<dyn CacheStore>, days: i64) -> Self {
        Self {
            store,
            retention: TimeDelta::days(days.max(0)),
        }
    }

    /// Oldest `computed_at` still considered fresh at `now`.
    pub fn freshness_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.retention
    }

    /// Fast path. `Some` only when at least one fresh bucket covers the
    /// query; the series is then built from buckets alone.
    pub async fn try_cache(&self, query: &SeriesQuery) -> Result<Option<Vec<TimeSeriesPoint>>> {
        let buckets = self
            .store
            .buckets(&query.bucket_query(), self.freshness_cutoff(Utc::now()))
            .await?;

        let entity_type = KeyValue::new("entity_type", query.entity_type.as_str());
        if buckets.is_empty() {
            metrics::cache_lookups().add(1, &[entity_type, KeyValue::new("result", "miss")]);
            debug!(entity = %query.entity_id, "metrics cache miss");
            return Ok(None);
        }

        metrics::cache_lookups().add(1, &[entity_type, KeyValue::new("result", "hit")]);
        debug!(entity = %query.entity_id, days = buckets.len(), "metrics cache hit");
        Ok(Some(buckets.iter().map(TimeSeriesPoint::from).collect()))
    }

    /// Compute and store buckets for every worker, station and the factory
    /// for one UTC day. Returns the number of buckets written.
    ///
    /// This is the batch job's entry point; request paths never call it.
    pub async fn rollup_day(&self, engine: &MetricsEngine, day: NaiveDate) -> Result<usize> {
        let window = TimeWindow::day(day);
        let filter = EventFilter::default().window(window);
        let computed_at = Utc::now();
        let mut buckets = Vec::new();

        for worker in engine.compute_worker_stats(&filter).await? {
            let d = worker.durations;
            buckets.push(MetricsBucket {
                date: day,
                entity_type: EntityType::Worker,
                entity_id: worker.worker_id.clone(),
                active_seconds: round_secs(d.working_seconds),
                idle_seconds: round_secs(d.idle_seconds),
                absent_seconds: round_secs(d.absent_seconds),
                units: d.total_units,
                occupancy_seconds: round_secs(d.working_seconds + d.idle_seconds),
                utilization_pct: round2(worker.utilization_pct()),
                computed_at,
            });
        }

        for station in engine.compute_workstation_stats(&filter).await? {
            let d = station.durations;
            buckets.push(MetricsBucket {
                date: day,
                entity_type: EntityType::Station,
                entity_id: station.station_id.clone(),
                active_seconds: round_secs(d.working_seconds),
                idle_seconds: round_secs(d.idle_seconds),
                absent_seconds: round_secs(d.absent_seconds),
                units: d.total_units,
                occupancy_seconds: round_secs(station.occupancy_seconds()),
                utilization_pct: round2(station.utilization_pct()),
                computed_at,
            });
        }

        let factory = engine.factory_stats(window).await?;
        if factory.active_workers > 0 || factory.total_units > 0 {
            buckets.push(MetricsBucket {
                date: day,
                entity_type: EntityType::Factory,
                entity_id: FACTORY_ENTITY_ID.to_string(),
                active_seconds: round_secs(factory.productive_seconds),
                idle_seconds: round_secs(factory.idle_seconds),
                absent_seconds: round_secs(factory.absent_seconds),
                units: factory.total_units,
                occupancy_seconds: round_secs(factory.productive_seconds + factory.idle_seconds),
                utilization_pct: round2(factory.avg_worker_utilization),
                computed_at,
            });
        }

        for bucket in &buckets {
            self.store.upsert_bucket(bucket).await?;
        }

        info!(%day, buckets = buckets.len(), "metrics rollup written");
        Ok(buckets.len())
    }

    /// Delete buckets past retention. Returns the number removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let removed = self
            .store
            .purge_buckets(self.freshness_cutoff(Utc::now()))
            .await?;
        info!(removed, "expired metrics buckets purged");
        Ok(removed)
    }
}
