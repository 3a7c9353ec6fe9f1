// src/core/pushmonitor/decider.rs

//! Strategy-dispatched decision logic: given a push snapshot and the current
//! partition assignment, decide whether the push is COMPLETED, fatally
//! short on replicas (ERROR), or still in flight (STARTED).
//!
//! The monitor never inspects the strategy itself; it resolves the decider
//! through `decider_for` and asks it.

use super::routing::{Instance, PartitionAssignment, ReplicaState};
use super::status::{ExecutionStatus, OfflinePushStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rule set for deciding when a push has enough healthy replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfflinePushStrategy {
    /// Every assigned replica of every partition must complete.
    WaitAllReplicas,
    /// One replica per partition may be missing or broken.
    WaitNMinusOneReplicaPerPartition,
}

impl fmt::Display for OfflinePushStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OfflinePushStrategy::WaitAllReplicas => "WAIT_ALL_REPLICAS",
            OfflinePushStrategy::WaitNMinusOneReplicaPerPartition => {
                "WAIT_N_MINUS_ONE_REPLICA_PER_PARTITION"
            }
        };
        f.write_str(name)
    }
}

/// Decision logic for one offline push strategy.
pub trait PushStatusDecider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Minimum number of COMPLETED replicas a partition needs before the
    /// strategy considers it done.
    fn min_ready_replicas(&self, replication_factor: u32) -> u32;

    /// Decides the push status from the push snapshot joined with the
    /// current partition assignment.
    ///
    /// A partition with fewer assigned replicas than the strategy minimum is
    /// left as in-flight, since the routing system may still be populating
    /// the assignment. A partition is only fatal once its ERROR replicas
    /// make the minimum unreachable.
    fn check_push_status_and_details(
        &self,
        push: &OfflinePushStatus,
        partition_assignment: &PartitionAssignment,
    ) -> (ExecutionStatus, Option<String>) {
        let min_required = self.min_ready_replicas(push.replication_factor);
        let mut ready_partitions = 0u32;

        for partition_id in 0..push.partition_count {
            let Some(partition) = partition_assignment.partition(partition_id) else {
                continue;
            };
            let Some(partition_status) = push.partition_status(partition_id) else {
                continue;
            };

            let assigned = partition.all_instances();
            let mut completed = 0u32;
            let mut errored = 0u32;
            for instance in &assigned {
                match partition_status
                    .replica_status(&instance.node_id)
                    .map(|r| r.current_status)
                {
                    Some(ExecutionStatus::Completed) => completed += 1,
                    Some(ExecutionStatus::Error) => errored += 1,
                    _ => {}
                }
            }

            if completed >= min_required {
                ready_partitions += 1;
                continue;
            }

            let assigned_count = assigned.len() as u32;
            if assigned_count >= min_required && assigned_count - errored < min_required {
                let details = format!(
                    "Partition {} has {} ERROR replicas out of {} assigned, but strategy {} \
                     requires {} ready replicas",
                    partition_id,
                    errored,
                    assigned_count,
                    self.name(),
                    min_required
                );
                return (ExecutionStatus::Error, Some(details));
            }
        }

        if push.partition_count > 0 && ready_partitions == push.partition_count {
            (ExecutionStatus::Completed, None)
        } else {
            (ExecutionStatus::Started, None)
        }
    }

    /// Instances the query-routing side may serve a partition from: those the
    /// external view reports as ONLINE.
    fn get_ready_to_serve_instances<'a>(
        &self,
        partition_assignment: &'a PartitionAssignment,
        partition_id: u32,
    ) -> Vec<&'a Instance> {
        partition_assignment
            .partition(partition_id)
            .map(|p| p.instances_in_state(ReplicaState::Online).iter().collect())
            .unwrap_or_default()
    }
}

/// Decider for `OfflinePushStrategy::WaitAllReplicas`.
pub struct WaitAllReplicasDecider;

impl PushStatusDecider for WaitAllReplicasDecider {
    fn name(&self) -> &'static str {
        "WAIT_ALL_REPLICAS"
    }

    fn min_ready_replicas(&self, replication_factor: u32) -> u32 {
        replication_factor
    }
}

/// Decider for `OfflinePushStrategy::WaitNMinusOneReplicaPerPartition`.
pub struct WaitNMinusOneReplicaPerPartitionDecider;

impl PushStatusDecider for WaitNMinusOneReplicaPerPartitionDecider {
    fn name(&self) -> &'static str {
        "WAIT_N_MINUS_ONE_REPLICA_PER_PARTITION"
    }

    fn min_ready_replicas(&self, replication_factor: u32) -> u32 {
        replication_factor.saturating_sub(1).max(1)
    }
}

static WAIT_ALL_REPLICAS: WaitAllReplicasDecider = WaitAllReplicasDecider;
static WAIT_N_MINUS_ONE: WaitNMinusOneReplicaPerPartitionDecider =
    WaitNMinusOneReplicaPerPartitionDecider;

/// Resolves the decider for a strategy tag.
pub fn decider_for(strategy: OfflinePushStrategy) -> &'static dyn PushStatusDecider {
    match strategy {
        OfflinePushStrategy::WaitAllReplicas => &WAIT_ALL_REPLICAS,
        OfflinePushStrategy::WaitNMinusOneReplicaPerPartition => &WAIT_N_MINUS_ONE,
    }
}
