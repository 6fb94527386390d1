//! Metrics collection and exposition for Prometheus.
//!
//! This module records what the request pipeline does: operations,
//! transport attempts, retries, token refreshes and user-visible errors.

mod recorder;

pub use recorder::{Metrics, MetricsRecorder};
