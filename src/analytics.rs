//! Analytics views composed from the aggregation engine and the event log.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use tracing::debug;

use crate::aggregate::MetricsEngine;
use crate::cache::{MetricsCache, SeriesQuery};
use crate::error::{Error, Result};
use crate::model::analytics::{
    ALERT_SAMPLE_LIMIT, AlertReport, DEFAULT_ALERT_THRESHOLD, DailyAverage, ModelVersionStats,
    ShiftComparison,
};
use crate::model::cache::{EntityType, TimeSeriesPoint};
use crate::model::event::Event;
use crate::model::metrics::{FactoryStats, WorkerStats};
use crate::model::{round2, round_secs};
use crate::store::{EventFilter, EventQuery, TimeWindow};

/// Days before today that enter the shift comparison average.
const COMPARISON_DAYS: i64 = 7;

/// Default row cap for event listings.
pub const DEFAULT_EVENT_LIMIT: i64 = 500;

pub struct Analytics {
    engine: Arc<MetricsEngine>,
    cache: MetricsCache,
    alert_threshold: f64,
}

impl Analytics {
    pub fn new(engine: Arc<MetricsEngine>, cache: MetricsCache) -> Self {
        Self {
            engine,
            cache,
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
        }
    }

    /// Threshold used when an alerts query does not supply one.
    pub fn with_alert_threshold(mut self, threshold: f64) -> Self {
        self.alert_threshold = threshold;
        self
    }

    // -----------------------------------------------------------------------
    // Time series
    // -----------------------------------------------------------------------

    /// Daily points for one entity: cached buckets when any exist for the
    /// query, otherwise recomputed from raw events. Never a mix of both.
    pub async fn time_series(&self, query: &SeriesQuery) -> Result<Vec<TimeSeriesPoint>> {
        match query.entity_type {
            EntityType::Worker => self.engine.ensure_worker(&query.entity_id).await?,
            EntityType::Station => self.engine.ensure_workstation(&query.entity_id).await?,
            EntityType::Factory => {}
        }

        if let Some(points) = self.cache.try_cache(query).await? {
            return Ok(points);
        }
        self.compute_live(query).await
    }

    /// Slow path: one point per UTC day that has events in the window.
    pub async fn compute_live(&self, query: &SeriesQuery) -> Result<Vec<TimeSeriesPoint>> {
        let base = entity_filter(query.entity_type, &query.entity_id);
        let filter = base.clone().window(query.window);

        let units: HashMap<NaiveDate, i64> = self
            .engine
            .events()
            .daily_units(&filter)
            .await?
            .into_iter()
            .map(|d| (d.date, d.units))
            .collect();
        let days = self.engine.events().event_days(&filter).await?;

        let mut points = Vec::with_capacity(days.len());
        for day in days {
            let day_filter = base.clone().window(clamp_to(TimeWindow::day(day), query.window));
            let (active_seconds, utilization_pct) = match query.entity_type {
                EntityType::Worker => self
                    .engine
                    .compute_worker_stats(&day_filter)
                    .await?
                    .first()
                    .map(|w| (w.durations.working_seconds, w.utilization_pct()))
                    .unwrap_or_default(),
                EntityType::Station => self
                    .engine
                    .compute_workstation_stats(&day_filter)
                    .await?
                    .first()
                    .map(|s| (s.durations.working_seconds, s.utilization_pct()))
                    .unwrap_or_default(),
                EntityType::Factory => {
                    let workers = self.engine.compute_worker_stats(&day_filter).await?;
                    let factory = FactoryStats::from_workers(&workers, 0);
                    (factory.productive_seconds, factory.avg_worker_utilization)
                }
            };

            points.push(TimeSeriesPoint {
                date: day,
                units: units.get(&day).copied().unwrap_or(0),
                active_hours: round2(active_seconds / 3600.0),
                utilization_pct: round2(utilization_pct),
            });
        }

        debug!(entity = %query.entity_id, days = points.len(), "time series computed live");
        Ok(points)
    }

    // -----------------------------------------------------------------------
    // Alerts
    // -----------------------------------------------------------------------

    /// Events below `threshold` confidence (default from configuration),
    /// newest first. The sample is capped; `total` is not.
    pub async fn alerts(&self, threshold: Option<f64>, window: TimeWindow) -> Result<AlertReport> {
        let threshold = threshold.unwrap_or(self.alert_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidParameter {
                name: "threshold",
                message: format!("{threshold} is outside [0, 1]"),
            });
        }

        let filter = EventFilter::default().window(window).below_confidence(threshold);
        let events = self.engine.events();
        let total = events.count(&filter).await?;
        let alerts = events
            .find(&EventQuery::new(filter).newest_first().limit(ALERT_SAMPLE_LIMIT))
            .await?;

        Ok(AlertReport {
            threshold,
            total,
            alerts,
        })
    }

    // -----------------------------------------------------------------------
    // Shift comparison
    // -----------------------------------------------------------------------

    /// Compare the worker's day containing `now` against the mean of the
    /// seven preceding days. Each day is computed on its own and days
    /// without events are left out of the mean.
    pub async fn shift_comparison(&self, worker_id: &str, now: DateTime<Utc>) -> Result<ShiftComparison> {
        self.engine.ensure_worker(worker_id).await?;

        let today = now.date_naive();
        let today_stats = self.worker_day(worker_id, today).await?;

        let mut previous = Vec::new();
        for offset in 1..=COMPARISON_DAYS {
            let day = today - TimeDelta::days(offset);
            if let Some(stats) = self.worker_day(worker_id, day).await? {
                previous.push(stats);
            }
        }

        Ok(ShiftComparison {
            worker_id: worker_id.to_string(),
            date: today,
            today: today_stats.as_ref().map(WorkerStats::to_metrics),
            seven_day_avg: daily_average(&previous),
        })
    }

    async fn worker_day(&self, worker_id: &str, day: NaiveDate) -> Result<Option<WorkerStats>> {
        let filter = EventFilter::default()
            .worker(worker_id)
            .window(TimeWindow::day(day));
        Ok(self.engine.compute_worker_stats(&filter).await?.into_iter().next())
    }

    // -----------------------------------------------------------------------
    // Model versions and listings
    // -----------------------------------------------------------------------

    /// Per model version: volume, mean confidence, first and last sighting.
    pub async fn model_versions(&self) -> Result<Vec<ModelVersionStats>> {
        self.engine.events().model_versions().await
    }

    /// Stored events matching `filter`, newest first.
    pub async fn recent_events(&self, filter: EventFilter, limit: Option<i64>) -> Result<Vec<Event>> {
        let query = EventQuery::new(filter)
            .newest_first()
            .limit(limit.unwrap_or(DEFAULT_EVENT_LIMIT));
        self.engine.events().find(&query).await
    }
}

fn entity_filter(entity_type: EntityType, entity_id: &str) -> EventFilter {
    match entity_type {
        EntityType::Worker => EventFilter::default().worker(entity_id),
        EntityType::Station => EventFilter::default().workstation(entity_id),
        EntityType::Factory => EventFilter::default(),
    }
}

/// Intersect a day window with the requested window.
fn clamp_to(day: TimeWindow, outer: TimeWindow) -> TimeWindow {
    let from = match (day.from, outer.from) {
        (Some(d), Some(o)) => Some(d.max(o)),
        (d, o) => d.or(o),
    };
    let to = match (day.to, outer.to) {
        (Some(d), Some(o)) => Some(d.min(o)),
        (d, o) => d.or(o),
    };
    TimeWindow::new(from, to)
}

/// Mean of per-day raw stats, rounded once at the end.
fn daily_average(days: &[WorkerStats]) -> Option<DailyAverage> {
    if days.is_empty() {
        return None;
    }
    let n = days.len() as f64;
    let mean = |f: fn(&WorkerStats) -> f64| days.iter().map(f).sum::<f64>() / n;

    Some(DailyAverage {
        active_time_seconds: round_secs(mean(|w| w.durations.working_seconds)),
        idle_time_seconds: round_secs(mean(|w| w.durations.idle_seconds)),
        utilization_pct: round2(mean(WorkerStats::utilization_pct)),
        total_units_produced: mean(|w| w.durations.total_units as f64).round() as i64,
        units_per_hour: round2(mean(WorkerStats::units_per_hour)),
        days: days.len(),
    })
}
