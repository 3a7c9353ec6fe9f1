// src/core/pushmonitor/retention.rs

//! Retention policy over one store's pushes currently held in the monitor's
//! map: keep at most N ERROR pushes, dropping the oldest versions first.
//!
//! Successful pushes are retired through version retirement on completion,
//! so the cap only bites when many ERROR pushes accumulate. Ordering is by
//! version number rather than by time, to be deterministic across restarts.

use super::status::ExecutionStatus;
use std::collections::BTreeMap;

/// Selects the version numbers of ERROR pushes to retire for one store.
///
/// `version_to_status` holds every version of the store currently in the
/// map with its push status; iteration order of the `BTreeMap` gives
/// ascending version numbers, so the smallest-versioned ERROR pushes are
/// retired first until at most `max_error_pushes_to_keep` remain.
pub fn select_error_versions_to_retire(
    version_to_status: &BTreeMap<i32, ExecutionStatus>,
    max_error_pushes_to_keep: usize,
) -> Vec<i32> {
    let mut error_versions: Vec<i32> = version_to_status
        .iter()
        .filter(|(_, status)| **status == ExecutionStatus::Error)
        .map(|(version, _)| *version)
        .collect();

    let excess = error_versions.len().saturating_sub(max_error_pushes_to_keep);
    error_versions.truncate(excess);
    error_versions
}
