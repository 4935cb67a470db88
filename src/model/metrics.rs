//! Derived productivity metrics.
//!
//! `*Stats` types hold raw, unrounded figures and are what further
//! computations (averages, rollups) consume. `*Metrics` types are the
//! rounded presentation records handed to callers.

use serde::{Deserialize, Serialize};

use super::{round2, round_secs};
use crate::reconstruct::Durations;

const SECS_PER_HOUR: f64 = 3600.0;

/// `numerator / denominator`, or 0 when the denominator is not positive.
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Raw per-worker figures for one window.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerStats {
    pub worker_id: String,
    pub durations: Durations,
    /// Last event time minus first event time.
    pub shift_seconds: f64,
}

impl WorkerStats {
    pub fn empty(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            durations: Durations::default(),
            shift_seconds: 0.0,
        }
    }

    /// working / (working + idle) * 100.
    pub fn utilization_pct(&self) -> f64 {
        let d = &self.durations;
        ratio(d.working_seconds, d.working_seconds + d.idle_seconds) * 100.0
    }

    /// Units per hour of active (working) time.
    pub fn units_per_hour(&self) -> f64 {
        ratio(
            self.durations.total_units as f64,
            self.durations.working_seconds / SECS_PER_HOUR,
        )
    }

    /// A worker counts as active in a window when their events span time.
    pub fn is_active(&self) -> bool {
        self.shift_seconds > 0.0
    }

    pub fn to_metrics(&self) -> WorkerMetrics {
        WorkerMetrics {
            worker_id: self.worker_id.clone(),
            active_time_seconds: round_secs(self.durations.working_seconds),
            idle_time_seconds: round_secs(self.durations.idle_seconds),
            absent_time_seconds: round_secs(self.durations.absent_seconds),
            utilization_pct: round2(self.utilization_pct()),
            total_units_produced: self.durations.total_units,
            units_per_hour: round2(self.units_per_hour()),
            shift_duration_seconds: round_secs(self.shift_seconds),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerMetrics {
    pub worker_id: String,
    pub active_time_seconds: i64,
    pub idle_time_seconds: i64,
    pub absent_time_seconds: i64,
    pub utilization_pct: f64,
    pub total_units_produced: i64,
    pub units_per_hour: f64,
    pub shift_duration_seconds: i64,
}

// ---------------------------------------------------------------------------
// Workstation
// ---------------------------------------------------------------------------

/// Raw per-station figures for one window.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkstationStats {
    pub station_id: String,
    pub durations: Durations,
}

impl WorkstationStats {
    pub fn empty(station_id: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            durations: Durations::default(),
        }
    }

    /// Time someone was present at the station, active or idle.
    pub fn occupancy_seconds(&self) -> f64 {
        self.durations.working_seconds + self.durations.idle_seconds
    }

    /// working / occupancy * 100. Kept separate from the worker formula:
    /// occupancy may grow to cover more states than working + idle.
    pub fn utilization_pct(&self) -> f64 {
        ratio(self.durations.working_seconds, self.occupancy_seconds()) * 100.0
    }

    /// Units per hour of occupancy (not of active time).
    pub fn throughput_rate(&self) -> f64 {
        ratio(
            self.durations.total_units as f64,
            self.occupancy_seconds() / SECS_PER_HOUR,
        )
    }

    pub fn to_metrics(&self) -> WorkstationMetrics {
        WorkstationMetrics {
            station_id: self.station_id.clone(),
            occupancy_seconds: round_secs(self.occupancy_seconds()),
            utilization_pct: round2(self.utilization_pct()),
            total_units_produced: self.durations.total_units,
            throughput_rate: round2(self.throughput_rate()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkstationMetrics {
    pub station_id: String,
    pub occupancy_seconds: i64,
    pub utilization_pct: f64,
    pub total_units_produced: i64,
    pub throughput_rate: f64,
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Raw factory rollup, built from raw worker stats.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FactoryStats {
    pub productive_seconds: f64,
    pub idle_seconds: f64,
    pub absent_seconds: f64,
    pub total_units: i64,
    pub avg_production_rate: f64,
    pub avg_worker_utilization: f64,
    pub active_workers: usize,
    pub total_events: u64,
}

impl FactoryStats {
    /// Roll up worker stats. Averages cover active workers only so that
    /// workers with no time span in the window do not dilute them.
    pub fn from_workers(workers: &[WorkerStats], total_events: u64) -> Self {
        let active: Vec<&WorkerStats> = workers.iter().filter(|w| w.is_active()).collect();
        let mean = |f: fn(&WorkerStats) -> f64| {
            if active.is_empty() {
                0.0
            } else {
                active.iter().map(|w| f(*w)).sum::<f64>() / active.len() as f64
            }
        };

        Self {
            productive_seconds: workers.iter().map(|w| w.durations.working_seconds).sum(),
            idle_seconds: workers.iter().map(|w| w.durations.idle_seconds).sum(),
            absent_seconds: workers.iter().map(|w| w.durations.absent_seconds).sum(),
            total_units: workers
                .iter()
                .fold(0i64, |acc, w| acc.saturating_add(w.durations.total_units)),
            avg_production_rate: mean(WorkerStats::units_per_hour),
            avg_worker_utilization: mean(WorkerStats::utilization_pct),
            active_workers: active.len(),
            total_events,
        }
    }

    pub fn to_metrics(&self) -> FactoryMetrics {
        FactoryMetrics {
            total_productive_seconds: round_secs(self.productive_seconds),
            total_units_produced: self.total_units,
            avg_production_rate: round2(self.avg_production_rate),
            avg_worker_utilization: round2(self.avg_worker_utilization),
            total_workers_active: self.active_workers as u64,
            total_events: self.total_events,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactoryMetrics {
    pub total_productive_seconds: i64,
    pub total_units_produced: i64,
    /// Units per hour, averaged over active workers.
    pub avg_production_rate: f64,
    /// Mean utilization % of active workers.
    pub avg_worker_utilization: f64,
    pub total_workers_active: u64,
    /// All stored events, regardless of the requested window.
    pub total_events: u64,
}
