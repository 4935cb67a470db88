//! Storage contracts.
//!
//! The metrics core only needs these three seams: an append-only,
//! dedup-enforcing event log, a daily bucket cache, and a read-mostly
//! registry of workers and workstations. `db::Db` implements them on
//! Postgres; [`MemoryStore`] implements them in-process.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};

use crate::error::Result;
use crate::model::analytics::{DailyUnits, ModelVersionStats};
use crate::model::cache::{BucketQuery, MetricsBucket};
use crate::model::event::{Event, NewEvent};
use crate::model::registry::{RegistryManifest, Worker, Workstation};

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Strongly-typed event filter. Every field is optional; set fields are ANDed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub worker_id: Option<String>,
    pub workstation_id: Option<String>,
    /// Inclusive lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub to: Option<DateTime<Utc>>,
    /// Strictly below this confidence.
    pub below_confidence: Option<f64>,
}

impl EventFilter {
    pub fn worker(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = Some(worker_id.into());
        self
    }

    pub fn workstation(mut self, workstation_id: impl Into<String>) -> Self {
        self.workstation_id = Some(workstation_id.into());
        self
    }

    pub fn window(mut self, window: TimeWindow) -> Self {
        self.from = window.from;
        self.to = window.to;
        self
    }

    pub fn below_confidence(mut self, threshold: f64) -> Self {
        self.below_confidence = Some(threshold);
        self
    }

    /// In-process evaluation of the filter.
    pub fn matches(&self, event: &Event) -> bool {
        self.worker_id.as_deref().is_none_or(|w| event.worker_id == w)
            && self
                .workstation_id
                .as_deref()
                .is_none_or(|s| event.workstation_id == s)
            && self.from.is_none_or(|from| event.timestamp >= from)
            && self.to.is_none_or(|to| event.timestamp <= to)
            && self.below_confidence.is_none_or(|t| event.confidence < t)
    }
}

/// Optional inclusive `[from, to]` instant range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// `[00:00:00.000, 23:59:59.999]` of a UTC calendar day.
    pub fn day(date: NaiveDate) -> Self {
        let start = date.and_time(NaiveTime::MIN).and_utc();
        let end = start + TimeDelta::days(1) - TimeDelta::milliseconds(1);
        Self {
            from: Some(start),
            to: Some(end),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Filter plus ordering by timestamp and an optional row limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQuery {
    pub filter: EventFilter,
    pub order: SortOrder,
    pub limit: Option<i64>,
}

impl EventQuery {
    pub fn new(filter: EventFilter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn newest_first(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Result of a bulk insert: duplicates are `skipped`, not errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: u64,
    pub skipped: u64,
}

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

/// Append-only event log with a unique `dedup_key`.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Unordered bulk insert. Dedup-key collisions count as `skipped`.
    /// Any other fault fails the call; if earlier rows already persisted
    /// the error is `Error::PartialIngest` carrying their counts.
    async fn insert_many(&self, events: &[NewEvent]) -> Result<InsertOutcome>;

    async fn find(&self, query: &EventQuery) -> Result<Vec<Event>>;

    async fn count(&self, filter: &EventFilter) -> Result<u64>;

    /// Units from `product_count` events summed per UTC day, ascending.
    async fn daily_units(&self, filter: &EventFilter) -> Result<Vec<DailyUnits>>;

    /// Distinct UTC days that have at least one matching event, ascending.
    async fn event_days(&self, filter: &EventFilter) -> Result<Vec<NaiveDate>>;

    /// Per-version stats, most recently seen first.
    async fn model_versions(&self) -> Result<Vec<ModelVersionStats>>;
}

/// Daily metrics buckets.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Buckets matching `query` computed at or after `not_before`, by date ascending.
    async fn buckets(
        &self,
        query: &BucketQuery,
        not_before: DateTime<Utc>,
    ) -> Result<Vec<MetricsBucket>>;

    /// Insert or replace the bucket for its (date, entity_type, entity_id).
    async fn upsert_bucket(&self, bucket: &MetricsBucket) -> Result<()>;

    /// Delete buckets computed before `cutoff`. Returns the number removed.
    async fn purge_buckets(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Worker and workstation reference data.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn worker(&self, worker_id: &str) -> Result<Option<Worker>>;
    async fn workstation(&self, station_id: &str) -> Result<Option<Workstation>>;
    async fn workers(&self) -> Result<Vec<Worker>>;
    async fn workstations(&self) -> Result<Vec<Workstation>>;
    async fn register_worker(&self, worker: &Worker) -> Result<()>;
    async fn register_workstation(&self, workstation: &Workstation) -> Result<()>;
}

/// Upsert every entry of a manifest. Returns (workers, workstations) written.
pub async fn load_manifest(
    registry: &dyn Registry,
    manifest: &RegistryManifest,
) -> Result<(usize, usize)> {
    for worker in &manifest.workers {
        registry.register_worker(worker).await?;
    }
    for station in &manifest.workstations {
        registry.register_workstation(station).await?;
    }
    tracing::info!(
        workers = manifest.workers.len(),
        workstations = manifest.workstations.len(),
        "registry manifest loaded"
    );
    Ok((manifest.workers.len(), manifest.workstations.len()))
}
