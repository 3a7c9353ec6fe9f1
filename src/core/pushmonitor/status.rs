// src/core/pushmonitor/status.rs

//! Data model for the lifecycle of one offline push: per-replica progress,
//! per-partition aggregation, and the push-level status snapshot.
//!
//! `OfflinePushStatus` values are treated as immutable once published into
//! the monitor's map: every mutation clones the snapshot, mutates the clone,
//! and swaps it in. A caller holding a reference to a snapshot outside the
//! monitor lock therefore always sees a consistent view.

use super::decider::OfflinePushStrategy;
use crate::core::OpalError;
use crate::core::meta::topics;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Execution status of a push (and of each of its replicas).
///
/// Push-level transitions are unidirectional; once a push reaches a terminal
/// status it is never mutated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    NotCreated,
    Started,
    EndOfPushReceived,
    Completed,
    Error,
    Archived,
}

impl ExecutionStatus {
    /// Terminal statuses are never transitioned out of by the monitor.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Error | ExecutionStatus::Archived
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::NotCreated => "NOT_CREATED",
            ExecutionStatus::Started => "STARTED",
            ExecutionStatus::EndOfPushReceived => "END_OF_PUSH_RECEIVED",
            ExecutionStatus::Completed => "COMPLETED",
            ExecutionStatus::Error => "ERROR",
            ExecutionStatus::Archived => "ARCHIVED",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The latest incremental push observed by a replica, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalPushStatus {
    pub version: String,
    pub status: ExecutionStatus,
}

/// Progress reported by one replica of one partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaStatus {
    pub instance_id: String,
    pub current_status: ExecutionStatus,
    pub messages_consumed: u64,
    pub incremental_push: Option<IncrementalPushStatus>,
}

impl ReplicaStatus {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            current_status: ExecutionStatus::Started,
            messages_consumed: 0,
            incremental_push: None,
        }
    }

    /// Whether this replica has consumed its partition up to the end-of-push
    /// marker (or beyond).
    pub fn has_received_end_of_push(&self) -> bool {
        matches!(
            self.current_status,
            ExecutionStatus::EndOfPushReceived | ExecutionStatus::Completed
        )
    }
}

/// Aggregated replica statuses for one partition of a push, keyed by the
/// serving instance's node id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionStatus {
    pub partition_id: u32,
    pub replica_statuses: HashMap<String, ReplicaStatus>,
}

impl PartitionStatus {
    pub fn new(partition_id: u32) -> Self {
        Self {
            partition_id,
            replica_statuses: HashMap::new(),
        }
    }

    /// Upserts the status a storage node reported for its replica.
    pub fn update_replica_status(
        &mut self,
        instance_id: &str,
        status: ExecutionStatus,
        messages_consumed: u64,
    ) {
        let replica = self
            .replica_statuses
            .entry(instance_id.to_string())
            .or_insert_with(|| ReplicaStatus::new(instance_id));
        replica.current_status = status;
        replica.messages_consumed = messages_consumed;
    }

    /// Records the state of an incremental push on one replica.
    pub fn update_incremental_push(
        &mut self,
        instance_id: &str,
        version: &str,
        status: ExecutionStatus,
    ) {
        let replica = self
            .replica_statuses
            .entry(instance_id.to_string())
            .or_insert_with(|| ReplicaStatus::new(instance_id));
        replica.incremental_push = Some(IncrementalPushStatus {
            version: version.to_string(),
            status,
        });
    }

    pub fn replica_status(&self, instance_id: &str) -> Option<&ReplicaStatus> {
        self.replica_statuses.get(instance_id)
    }

    /// Number of replicas that have consumed up to the end-of-push marker.
    pub fn count_at_or_past_end_of_push(&self) -> u32 {
        self.replica_statuses
            .values()
            .filter(|r| r.has_received_end_of_push())
            .count() as u32
    }
}

/// Snapshot of one in-flight or recently-terminal push, keyed by its version
/// topic (`<storeName>_v<versionNumber>`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflinePushStatus {
    pub kafka_topic: String,
    pub partition_count: u32,
    pub replication_factor: u32,
    pub strategy: OfflinePushStrategy,
    pub current_status: ExecutionStatus,
    pub status_details: Option<String>,
    pub start_time_sec: u64,
    pub partition_statuses: BTreeMap<u32, PartitionStatus>,
}

impl OfflinePushStatus {
    pub fn new(
        kafka_topic: impl Into<String>,
        partition_count: u32,
        replication_factor: u32,
        strategy: OfflinePushStrategy,
    ) -> Self {
        Self {
            kafka_topic: kafka_topic.into(),
            partition_count,
            replication_factor,
            strategy,
            current_status: ExecutionStatus::Started,
            status_details: None,
            start_time_sec: now_secs(),
            partition_statuses: (0..partition_count)
                .map(|id| (id, PartitionStatus::new(id)))
                .collect(),
        }
    }

    /// Whether the state machine allows moving from the current status to
    /// `new_status`.
    pub fn validate_status_transition(&self, new_status: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        matches!(
            (self.current_status, new_status),
            (NotCreated, Started)
                | (Started, Started)
                | (Started, EndOfPushReceived)
                | (Started, Completed)
                | (Started, Error)
                | (EndOfPushReceived, Completed)
                | (EndOfPushReceived, Error)
                | (Completed, Archived)
                | (Error, Archived)
        )
    }

    /// Applies a status change. Callers are expected to have validated the
    /// transition first; details are only overwritten when provided.
    pub fn update_status(&mut self, new_status: ExecutionStatus, new_details: Option<String>) {
        self.current_status = new_status;
        if new_details.is_some() {
            self.status_details = new_details;
        }
    }

    /// Replaces the status of one partition with what a storage node reported.
    pub fn set_partition_status(&mut self, partition_status: PartitionStatus) -> Result<(), OpalError> {
        if partition_status.partition_id >= self.partition_count {
            return Err(OpalError::InvalidState(format!(
                "Partition id {} is out of range for topic: {} with {} partitions",
                partition_status.partition_id, self.kafka_topic, self.partition_count
            )));
        }
        self.partition_statuses
            .insert(partition_status.partition_id, partition_status);
        Ok(())
    }

    pub fn partition_status(&self, partition_id: u32) -> Option<&PartitionStatus> {
        self.partition_statuses.get(&partition_id)
    }

    /// Per-replica consumed-message counts, keyed by replica id.
    pub fn progress(&self) -> HashMap<String, u64> {
        let mut progress = HashMap::new();
        for (partition_id, partition) in &self.partition_statuses {
            for replica in partition.replica_statuses.values() {
                progress.insert(
                    topics::compose_replica_id(&self.kafka_topic, *partition_id, &replica.instance_id),
                    replica.messages_consumed,
                );
            }
        }
        progress
    }

    /// A hybrid push can hand over to buffer replay once the bulk portion is
    /// fully consumed: the push is still STARTED and every partition has at
    /// least `replication_factor` replicas at or past END_OF_PUSH_RECEIVED.
    pub fn is_ready_to_start_buffer_replay(&self) -> bool {
        self.current_status == ExecutionStatus::Started
            && self.partition_statuses.len() as u32 == self.partition_count
            && self
                .partition_statuses
                .values()
                .all(|p| p.count_at_or_past_end_of_push() >= self.replication_factor)
    }

    /// Status of one incremental push, aggregated across replicas: ERROR if
    /// any replica failed it, COMPLETED when every partition has at least
    /// `replication_factor` replicas done with it, STARTED once any replica
    /// has seen it, NOT_CREATED otherwise.
    pub fn check_incremental_push_status(&self, incremental_version: &str) -> ExecutionStatus {
        let mut any_seen = false;
        let mut completed_partitions = 0u32;
        for partition in self.partition_statuses.values() {
            let mut completed = 0u32;
            for replica in partition.replica_statuses.values() {
                let Some(incremental) = &replica.incremental_push else {
                    continue;
                };
                if incremental.version != incremental_version {
                    continue;
                }
                any_seen = true;
                match incremental.status {
                    ExecutionStatus::Error => return ExecutionStatus::Error,
                    ExecutionStatus::Completed => completed += 1,
                    _ => {}
                }
            }
            if completed >= self.replication_factor {
                completed_partitions += 1;
            }
        }
        if self.partition_count > 0 && completed_partitions == self.partition_count {
            ExecutionStatus::Completed
        } else if any_seen {
            ExecutionStatus::Started
        } else {
            ExecutionStatus::NotCreated
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
