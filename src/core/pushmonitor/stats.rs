// src/core/pushmonitor/stats.rs

//! Health-stats sink for push outcomes and durations.

use crate::core::metrics;

/// Records push outcomes and durations, keyed by store.
pub trait PushHealthStats: Send + Sync {
    fn record_successful_push(&self, store_name: &str, duration_sec: u64);

    fn record_failed_push(&self, store_name: &str, duration_sec: u64);

    fn record_push_preparation_duration(&self, store_name: &str, wait_sec: u64);
}

/// `PushHealthStats` implementation backed by the global Prometheus registry.
#[derive(Debug, Default)]
pub struct PrometheusPushHealthStats;

impl PushHealthStats for PrometheusPushHealthStats {
    fn record_successful_push(&self, store_name: &str, duration_sec: u64) {
        metrics::PUSHES_COMPLETED_TOTAL
            .with_label_values(&[store_name])
            .inc();
        metrics::PUSH_DURATION_SECONDS
            .with_label_values(&[store_name])
            .observe(duration_sec as f64);
    }

    fn record_failed_push(&self, store_name: &str, duration_sec: u64) {
        metrics::PUSHES_FAILED_TOTAL
            .with_label_values(&[store_name])
            .inc();
        metrics::PUSH_DURATION_SECONDS
            .with_label_values(&[store_name])
            .observe(duration_sec as f64);
    }

    fn record_push_preparation_duration(&self, store_name: &str, wait_sec: u64) {
        metrics::PUSH_PREPARATION_SECONDS
            .with_label_values(&[store_name])
            .observe(wait_sec as f64);
    }
}
