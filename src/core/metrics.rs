// src/core/metrics.rs

//! Defines and registers Prometheus metrics for push monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only
//! once globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, HistogramVec, TextEncoder, register_counter_vec, register_histogram_vec,
};

lazy_static! {
    // --- Push outcome counters ---
    /// The total number of pushes that reached COMPLETED, labeled by store.
    pub static ref PUSHES_COMPLETED_TOTAL: CounterVec =
        register_counter_vec!("opal_pushes_completed_total", "Total number of completed offline pushes.", &["store"]).unwrap();
    /// The total number of pushes that reached ERROR, labeled by store.
    pub static ref PUSHES_FAILED_TOTAL: CounterVec =
        register_counter_vec!("opal_pushes_failed_total", "Total number of failed offline pushes.", &["store"]).unwrap();

    // --- Histograms ---
    /// A histogram of end-to-end push durations, labeled by store.
    pub static ref PUSH_DURATION_SECONDS: HistogramVec =
        register_histogram_vec!("opal_push_duration_seconds", "Duration of offline pushes in seconds.", &["store"],
            vec![60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0, 14400.0]).unwrap();
    /// A histogram of how long pushes waited in preparation before starting.
    pub static ref PUSH_PREPARATION_SECONDS: HistogramVec =
        register_histogram_vec!("opal_push_preparation_seconds", "Preparation wait time of offline pushes in seconds.", &["store"],
            vec![1.0, 5.0, 15.0, 60.0, 300.0, 900.0]).unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap()
}
