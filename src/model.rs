//! Core data model.
//!
//! Events are immutable point observations from the perception pipeline.
//! Everything else here is derived from them (metrics, cache buckets,
//! analytics views) or is reference data used for lookups.

pub mod analytics;
pub mod cache;
pub mod event;
pub mod metrics;
pub mod registry;

/// Round to two decimal places for presentation.
///
/// Only applied when building output records; derived computations
/// (averages, sums) work from raw values.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to four decimal places (confidence averages).
pub(crate) fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Whole seconds, rounded to nearest.
pub(crate) fn round_secs(value: f64) -> i64 {
    value.round() as i64
}
