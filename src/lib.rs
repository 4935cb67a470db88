//! # floorwatch
//!
//! Worker productivity metrics for a factory floor monitored by computer
//! vision. Ingests state and production events with fingerprint dedup,
//! reconstructs time-in-state from event sequences, aggregates worker,
//! workstation and factory metrics, serves cached and live analytics, and
//! notifies subscribers when new data lands.
//!
//! Storage sits behind the [`store`] traits: Postgres via [`db::Db`], or
//! in-process via [`store::MemoryStore`].

pub mod aggregate;
pub mod analytics;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod fingerprint;
pub mod ingest;
pub mod model;
pub mod notify;
pub mod reconstruct;
pub mod store;
pub mod telemetry;
