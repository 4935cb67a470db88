//! Analytics views: alerts, shift comparison, model version breakdown.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::event::Event;
use super::metrics::WorkerMetrics;

/// Default confidence below which an event is flagged.
pub const DEFAULT_ALERT_THRESHOLD: f64 = 0.75;

/// Maximum number of flagged events returned in one report.
pub const ALERT_SAMPLE_LIMIT: i64 = 100;

/// Low-confidence events, newest first.
///
/// `total` counts every match; `alerts` holds at most
/// [`ALERT_SAMPLE_LIMIT`] of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertReport {
    pub threshold: f64,
    pub total: u64,
    pub alerts: Vec<Event>,
}

/// Per-day averages for one worker over the preceding week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAverage {
    pub active_time_seconds: i64,
    pub idle_time_seconds: i64,
    pub utilization_pct: f64,
    pub total_units_produced: i64,
    pub units_per_hour: f64,
    /// Days that had events and therefore entered the average.
    pub days: usize,
}

/// Today versus the mean of the previous seven days that had events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftComparison {
    pub worker_id: String,
    pub date: NaiveDate,
    pub today: Option<WorkerMetrics>,
    pub seven_day_avg: Option<DailyAverage>,
}

/// Event volume and confidence for one perception model version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersionStats {
    pub version: String,
    pub event_count: u64,
    pub avg_confidence: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Sum of `product_count` units for one UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyUnits {
    pub date: NaiveDate,
    pub units: i64,
}
