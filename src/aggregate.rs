//! Metrics aggregation engine.
//!
//! Loads events for a window, splits them per entity and runs duration
//! reconstruction on each slice. Entity slices are disjoint, so each
//! computation is independent of the others.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use tracing::{Instrument, debug};

use crate::error::{Error, Result};
use crate::model::event::Event;
use crate::model::metrics::{
    FactoryMetrics, FactoryStats, WorkerMetrics, WorkerStats, WorkstationMetrics,
    WorkstationStats,
};
use crate::reconstruct::{reconstruct_sorted, sort_timeline, span_seconds};
use crate::store::{EventFilter, EventQuery, EventStore, Registry, TimeWindow};
use crate::telemetry::metrics;
use crate::telemetry::span::{record_event_count, start_metrics_span};

pub struct MetricsEngine {
    events: Arc<dyn EventStore>,
    registry: Arc<dyn Registry>,
}

impl MetricsEngine {
    pub fn new(events: Arc<dyn EventStore>, registry: Arc<dyn Registry>) -> Self {
        Self { events, registry }
    }

    pub fn events(&self) -> &Arc<dyn EventStore> {
        &self.events
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Registry checks
    // -----------------------------------------------------------------------

    /// Fail with `NotFound` unless the worker is registered.
    pub async fn ensure_worker(&self, worker_id: &str) -> Result<()> {
        match self.registry.worker(worker_id).await? {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("worker {worker_id}"))),
        }
    }

    /// Fail with `NotFound` unless the workstation is registered.
    pub async fn ensure_workstation(&self, station_id: &str) -> Result<()> {
        match self.registry.workstation(station_id).await? {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("workstation {station_id}"))),
        }
    }

    // -----------------------------------------------------------------------
    // Workers
    // -----------------------------------------------------------------------

    /// Raw stats for one worker or all workers in `window`.
    ///
    /// A registered worker with no events in the window yields one
    /// zero-valued entry; an unregistered one is `NotFound`.
    pub async fn worker_stats(
        &self,
        worker_id: Option<&str>,
        window: TimeWindow,
    ) -> Result<Vec<WorkerStats>> {
        let mut filter = EventFilter::default().window(window);
        if let Some(id) = worker_id {
            self.ensure_worker(id).await?;
            filter = filter.worker(id);
        }

        let mut stats = self.compute_worker_stats(&filter).await?;
        if let (Some(id), true) = (worker_id, stats.is_empty()) {
            stats.push(WorkerStats::empty(id));
        }
        Ok(stats)
    }

    pub async fn worker_metrics(
        &self,
        worker_id: Option<&str>,
        window: TimeWindow,
    ) -> Result<Vec<WorkerMetrics>> {
        let stats = self.worker_stats(worker_id, window).await?;
        Ok(stats.iter().map(WorkerStats::to_metrics).collect())
    }

    /// Per-worker stats for whatever matches `filter`. No registry lookup,
    /// and workers without events are simply absent.
    pub(crate) async fn compute_worker_stats(
        &self,
        filter: &EventFilter,
    ) -> Result<Vec<WorkerStats>> {
        let span = start_metrics_span("worker", filter.worker_id.as_deref());
        let started = Instant::now();

        let events = self.load(filter).instrument(span.clone()).await?;
        record_event_count(&span, events.len());

        let stats: Vec<WorkerStats> = group_by(&events, |e| &e.worker_id)
            .into_iter()
            .map(|(worker_id, slice)| {
                let timeline = sort_timeline(slice);
                WorkerStats {
                    worker_id: worker_id.to_string(),
                    durations: reconstruct_sorted(&timeline),
                    shift_seconds: span_seconds(&timeline),
                }
            })
            .collect();

        record_duration("metrics.worker", started);
        span.in_scope(|| debug!(workers = stats.len(), "worker stats computed"));
        Ok(stats)
    }

    // -----------------------------------------------------------------------
    // Workstations
    // -----------------------------------------------------------------------

    /// Raw stats for one station or all stations in `window`.
    pub async fn workstation_stats(
        &self,
        station_id: Option<&str>,
        window: TimeWindow,
    ) -> Result<Vec<WorkstationStats>> {
        let mut filter = EventFilter::default().window(window);
        if let Some(id) = station_id {
            self.ensure_workstation(id).await?;
            filter = filter.workstation(id);
        }

        let mut stats = self.compute_workstation_stats(&filter).await?;
        if let (Some(id), true) = (station_id, stats.is_empty()) {
            stats.push(WorkstationStats::empty(id));
        }
        Ok(stats)
    }

    pub async fn workstation_metrics(
        &self,
        station_id: Option<&str>,
        window: TimeWindow,
    ) -> Result<Vec<WorkstationMetrics>> {
        let stats = self.workstation_stats(station_id, window).await?;
        Ok(stats.iter().map(WorkstationStats::to_metrics).collect())
    }

    pub(crate) async fn compute_workstation_stats(
        &self,
        filter: &EventFilter,
    ) -> Result<Vec<WorkstationStats>> {
        let span = start_metrics_span("workstation", filter.workstation_id.as_deref());
        let started = Instant::now();

        let events = self.load(filter).instrument(span.clone()).await?;
        record_event_count(&span, events.len());

        let stats: Vec<WorkstationStats> = group_by(&events, |e| &e.workstation_id)
            .into_iter()
            .map(|(station_id, slice)| WorkstationStats {
                station_id: station_id.to_string(),
                durations: reconstruct_sorted(&sort_timeline(slice)),
            })
            .collect();

        record_duration("metrics.workstation", started);
        Ok(stats)
    }

    // -----------------------------------------------------------------------
    // Factory
    // -----------------------------------------------------------------------

    pub async fn factory_stats(&self, window: TimeWindow) -> Result<FactoryStats> {
        let filter = EventFilter::default().window(window);
        let workers = self.compute_worker_stats(&filter).await?;
        // Dataset size indicator: deliberately not scoped to the window.
        let total_events = self.events.count(&EventFilter::default()).await?;
        Ok(FactoryStats::from_workers(&workers, total_events))
    }

    pub async fn factory_metrics(&self, window: TimeWindow) -> Result<FactoryMetrics> {
        Ok(self.factory_stats(window).await?.to_metrics())
    }

    async fn load(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        self.events.find(&EventQuery::new(filter.clone())).await
    }
}

/// Partition events by an entity key. Keys come out sorted.
fn group_by<'a, F>(events: &'a [Event], key: F) -> BTreeMap<&'a str, Vec<&'a Event>>
where
    F: Fn(&'a Event) -> &'a String,
{
    let mut groups: BTreeMap<&str, Vec<&Event>> = BTreeMap::new();
    for event in events {
        groups.entry(key(event).as_str()).or_default().push(event);
    }
    groups
}

fn record_duration(operation: &'static str, started: Instant) {
    metrics::operation_duration_ms().record(
        started.elapsed().as_secs_f64() * 1000.0,
        &[KeyValue::new("operation", operation)],
    );
}
