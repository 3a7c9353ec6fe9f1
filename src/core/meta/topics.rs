// src/core/meta/topics.rs

//! Naming scheme for version topics and replica ids.
//!
//! A version topic is named `<storeName>_v<versionNumber>`. The parsers here
//! are total: a topic without a well-formed version suffix is treated as a
//! store with no version marker rather than an error, since the monitor may
//! receive arbitrary topic strings from its event feeds.

/// Separator between the store name and the version number in a topic name.
const VERSION_SEPARATOR: &str = "_v";

/// Suffix appended to a store name to form its real-time (buffer replay) topic.
const REAL_TIME_TOPIC_SUFFIX: &str = "_rt";

/// Composes the version topic name for a store version.
pub fn compose_version_topic(store_name: &str, version_number: i32) -> String {
    format!("{store_name}{VERSION_SEPARATOR}{version_number}")
}

/// Composes the real-time topic name for a hybrid store.
pub fn compose_real_time_topic(store_name: &str) -> String {
    format!("{store_name}{REAL_TIME_TOPIC_SUFFIX}")
}

/// Splits a version topic into its store name and version number.
///
/// Returns `None` when the topic does not end with `_v<digits>`.
pub fn parse_version_topic(topic: &str) -> Option<(&str, i32)> {
    let idx = topic.rfind(VERSION_SEPARATOR)?;
    let (store_name, suffix) = topic.split_at(idx);
    let version = suffix[VERSION_SEPARATOR.len()..].parse::<i32>().ok()?;
    if store_name.is_empty() {
        return None;
    }
    Some((store_name, version))
}

/// Extracts the store name from a version topic, falling back to the whole
/// topic string when no version suffix is present.
pub fn store_name_from_topic(topic: &str) -> &str {
    parse_version_topic(topic).map_or(topic, |(store, _)| store)
}

/// Extracts the version number from a version topic, falling back to 0 when
/// no version suffix is present.
pub fn version_from_topic(topic: &str) -> i32 {
    parse_version_topic(topic).map_or(0, |(_, version)| version)
}

/// Composes the id of one replica of one partition of a push.
///
/// The ':' separator never appears in topic names or partition numbers, so
/// the instance id can be recovered unambiguously even when it contains
/// underscores (e.g. `host_1234`).
pub fn compose_replica_id(topic: &str, partition_id: u32, instance_id: &str) -> String {
    format!("{topic}:{partition_id}:{instance_id}")
}

/// Extracts the instance id from a replica id. Total: a malformed replica id
/// is returned unchanged.
pub fn instance_id_from_replica_id(replica_id: &str) -> &str {
    replica_id.splitn(3, ':').nth(2).unwrap_or(replica_id)
}
