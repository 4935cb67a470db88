//! Pre-aggregated daily buckets and the time-series points built from them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Entity id used for factory-wide buckets.
pub const FACTORY_ENTITY_ID: &str = "factory";

/// Which kind of entity a bucket or series describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Worker,
    Station,
    Factory,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Worker => "worker",
            EntityType::Station => "station",
            EntityType::Factory => "factory",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "worker" => Ok(EntityType::Worker),
            "station" | "workstation" => Ok(EntityType::Station),
            "factory" => Ok(EntityType::Factory),
            other => Err(Error::Other(format!("unknown entity type: {other}"))),
        }
    }
}

/// One day of pre-aggregated metrics for one entity.
/// Unique per (`date`, `entity_type`, `entity_id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsBucket {
    pub date: NaiveDate,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub active_seconds: i64,
    pub idle_seconds: i64,
    pub absent_seconds: i64,
    pub units: i64,
    pub occupancy_seconds: i64,
    pub utilization_pct: f64,
    pub computed_at: DateTime<Utc>,
}

/// Selects buckets for one entity over an inclusive day range.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketQuery {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl BucketQuery {
    pub fn matches(&self, bucket: &MetricsBucket) -> bool {
        bucket.entity_type == self.entity_type
            && bucket.entity_id == self.entity_id
            && self.from.is_none_or(|from| bucket.date >= from)
            && self.to.is_none_or(|to| bucket.date <= to)
    }
}

/// One day in an entity's time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub units: i64,
    pub active_hours: f64,
    pub utilization_pct: f64,
}

impl From<&MetricsBucket> for TimeSeriesPoint {
    fn from(bucket: &MetricsBucket) -> Self {
        Self {
            date: bucket.date,
            units: bucket.units,
            active_hours: super::round2(bucket.active_seconds as f64 / 3600.0),
            utilization_pct: bucket.utilization_pct,
        }
    }
}
