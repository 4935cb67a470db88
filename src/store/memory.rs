//! In-process implementation of the storage contracts.
//!
//! Backs tests and dry runs. Enforces the same dedup-key uniqueness
//! as the Postgres adapter.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CacheStore, EventFilter, EventQuery, EventStore, InsertOutcome, Registry, SortOrder};
use crate::error::Result;
use crate::model::analytics::{DailyUnits, ModelVersionStats};
use crate::model::cache::{BucketQuery, EntityType, MetricsBucket};
use crate::model::event::{Event, EventType, NewEvent};
use crate::model::registry::{Worker, Workstation};
use crate::model::round4;

#[derive(Default)]
struct EventLog {
    events: Vec<Event>,
    keys: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    log: RwLock<EventLog>,
    buckets: RwLock<HashMap<(NaiveDate, EntityType, String), MetricsBucket>>,
    workers: RwLock<BTreeMap<String, Worker>>,
    workstations: RwLock<BTreeMap<String, Workstation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn matching(&self, filter: &EventFilter) -> Vec<Event> {
        let log = self.log.read().await;
        log.events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_many(&self, events: &[NewEvent]) -> Result<InsertOutcome> {
        let mut log = self.log.write().await;
        let now = Utc::now();
        let mut outcome = InsertOutcome::default();

        for event in events {
            if log.keys.insert(event.dedup_key.clone()) {
                log.events.push(event.clone().into_event(Uuid::new_v4(), now));
                outcome.inserted += 1;
            } else {
                outcome.skipped += 1;
            }
        }
        Ok(outcome)
    }

    async fn find(&self, query: &EventQuery) -> Result<Vec<Event>> {
        let mut events = self.matching(&query.filter).await;
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        if query.order == SortOrder::Descending {
            events.reverse();
        }
        if let Some(limit) = query.limit {
            events.truncate(limit.max(0) as usize);
        }
        Ok(events)
    }

    async fn count(&self, filter: &EventFilter) -> Result<u64> {
        let log = self.log.read().await;
        Ok(log.events.iter().filter(|e| filter.matches(e)).count() as u64)
    }

    async fn daily_units(&self, filter: &EventFilter) -> Result<Vec<DailyUnits>> {
        let mut by_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for event in self.matching(filter).await {
            if event.event_type == EventType::ProductCount {
                *by_day.entry(event.timestamp.date_naive()).or_default() += event.count;
            }
        }
        Ok(by_day
            .into_iter()
            .map(|(date, units)| DailyUnits { date, units })
            .collect())
    }

    async fn event_days(&self, filter: &EventFilter) -> Result<Vec<NaiveDate>> {
        let days: std::collections::BTreeSet<NaiveDate> = self
            .matching(filter)
            .await
            .iter()
            .map(|e| e.timestamp.date_naive())
            .collect();
        Ok(days.into_iter().collect())
    }

    async fn model_versions(&self) -> Result<Vec<ModelVersionStats>> {
        struct Acc {
            count: u64,
            confidence_sum: f64,
            first: DateTime<Utc>,
            last: DateTime<Utc>,
        }

        let log = self.log.read().await;
        let mut by_version: HashMap<&str, Acc> = HashMap::new();
        for event in &log.events {
            by_version
                .entry(event.model_version.as_str())
                .and_modify(|acc| {
                    acc.count += 1;
                    acc.confidence_sum += event.confidence;
                    acc.first = acc.first.min(event.timestamp);
                    acc.last = acc.last.max(event.timestamp);
                })
                .or_insert(Acc {
                    count: 1,
                    confidence_sum: event.confidence,
                    first: event.timestamp,
                    last: event.timestamp,
                });
        }

        let mut stats: Vec<ModelVersionStats> = by_version
            .into_iter()
            .map(|(version, acc)| ModelVersionStats {
                version: version.to_string(),
                event_count: acc.count,
                avg_confidence: round4(acc.confidence_sum / acc.count as f64),
                first_seen: acc.first,
                last_seen: acc.last,
            })
            .collect();
        stats.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then_with(|| a.version.cmp(&b.version)));
        Ok(stats)
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn buckets(
        &self,
        query: &BucketQuery,
        not_before: DateTime<Utc>,
    ) -> Result<Vec<MetricsBucket>> {
        let buckets = self.buckets.read().await;
        let mut found: Vec<MetricsBucket> = buckets
            .values()
            .filter(|b| query.matches(b) && b.computed_at >= not_before)
            .cloned()
            .collect();
        found.sort_by_key(|b| b.date);
        Ok(found)
    }

    async fn upsert_bucket(&self, bucket: &MetricsBucket) -> Result<()> {
        let key = (bucket.date, bucket.entity_type, bucket.entity_id.clone());
        self.buckets.write().await.insert(key, bucket.clone());
        Ok(())
    }

    async fn purge_buckets(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|_, b| b.computed_at >= cutoff);
        Ok((before - buckets.len()) as u64)
    }
}

#[async_trait]
impl Registry for MemoryStore {
    async fn worker(&self, worker_id: &str) -> Result<Option<Worker>> {
        Ok(self.workers.read().await.get(worker_id).cloned())
    }

    async fn workstation(&self, station_id: &str) -> Result<Option<Workstation>> {
        Ok(self.workstations.read().await.get(station_id).cloned())
    }

    async fn workers(&self) -> Result<Vec<Worker>> {
        Ok(self.workers.read().await.values().cloned().collect())
    }

    async fn workstations(&self) -> Result<Vec<Workstation>> {
        Ok(self.workstations.read().await.values().cloned().collect())
    }

    async fn register_worker(&self, worker: &Worker) -> Result<()> {
        self.workers
            .write()
            .await
            .insert(worker.worker_id.clone(), worker.clone());
        Ok(())
    }

    async fn register_workstation(&self, workstation: &Workstation) -> Result<()> {
        self.workstations
            .write()
            .await
            .insert(workstation.station_id.clone(), workstation.clone());
        Ok(())
    }
}
