// src/core/pushmonitor/routing.rs

//! View of the routing system: which serving instances host which partitions
//! of a version topic, and the subscription interface through which the
//! monitor observes routing changes.

use crate::core::OpalError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A serving instance in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub node_id: String,
    pub host: String,
    pub port: u16,
}

impl Instance {
    pub fn new(node_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            node_id: node_id.into(),
            host: host.into(),
            port,
        }
    }
}

/// State of a replica as observed in the routing system's external view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplicaState {
    Bootstrap,
    Online,
    Error,
}

/// The instances assigned to one partition, grouped by observed replica state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partition {
    pub id: u32,
    state_to_instances: HashMap<ReplicaState, Vec<Instance>>,
}

impl Partition {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            state_to_instances: HashMap::new(),
        }
    }

    pub fn add_instance(&mut self, state: ReplicaState, instance: Instance) {
        self.state_to_instances.entry(state).or_default().push(instance);
    }

    pub fn instances_in_state(&self, state: ReplicaState) -> &[Instance] {
        self.state_to_instances.get(&state).map_or(&[], Vec::as_slice)
    }

    /// All assigned instances regardless of state.
    pub fn all_instances(&self) -> Vec<&Instance> {
        self.state_to_instances.values().flatten().collect()
    }
}

/// The routing system's current partition → instances mapping for one topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionAssignment {
    pub topic: String,
    pub expected_partition_count: u32,
    partitions: BTreeMap<u32, Partition>,
}

impl PartitionAssignment {
    pub fn new(topic: impl Into<String>, expected_partition_count: u32) -> Self {
        Self {
            topic: topic.into(),
            expected_partition_count,
            partitions: BTreeMap::new(),
        }
    }

    pub fn add_partition(&mut self, partition: Partition) {
        self.partitions.insert(partition.id, partition);
    }

    pub fn partition(&self, partition_id: u32) -> Option<&Partition> {
        self.partitions.get(&partition_id)
    }

    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.values()
    }

    pub fn assigned_partition_count(&self) -> u32 {
        self.partitions.len() as u32
    }
}

/// Callback interface through which the routing repository notifies the
/// monitor of assignment changes.
///
/// Handlers must never be given a reason to panic the producer: an `Err`
/// return is reserved for unrecoverable internal invariant violations; all
/// routine failures are logged by the listener itself.
#[async_trait]
pub trait RoutingDataChangedListener: Send + Sync {
    /// The external view (observed assignment) for a topic changed.
    async fn on_external_view_change(
        &self,
        partition_assignment: PartitionAssignment,
    ) -> Result<(), OpalError>;

    /// The routing resource for a topic disappeared from the external view.
    async fn on_routing_data_deleted(&self, topic: &str) -> Result<(), OpalError>;
}

/// Read access to routing data plus change subscriptions, per topic.
#[async_trait]
pub trait RoutingDataRepository: Send + Sync {
    /// Registers a listener for routing changes of one topic.
    async fn subscribe_routing_data_change(
        &self,
        topic: &str,
        listener: Arc<dyn RoutingDataChangedListener>,
    ) -> Result<(), OpalError>;

    /// Removes a previously registered listener.
    ///
    /// May be called re-entrantly from within a listener callback that is
    /// still in flight; implementations must record the intent and complete
    /// the removal on the callback's unwind rather than deadlock.
    async fn unsubscribe_routing_data_change(
        &self,
        topic: &str,
        listener: &Arc<dyn RoutingDataChangedListener>,
    ) -> Result<(), OpalError>;

    /// Whether the routing system currently knows the topic at all.
    async fn contains_topic(&self, topic: &str) -> bool;

    /// Whether the resource still exists in the cluster manager's ideal
    /// state (as opposed to the observed external view).
    async fn resources_exist_in_ideal_state(&self, topic: &str) -> bool;

    /// Current partition assignment for a topic.
    async fn get_partition_assignments(&self, topic: &str)
    -> Result<PartitionAssignment, OpalError>;

    /// The set of currently live instances, keyed by node id.
    async fn get_live_instances(&self) -> HashMap<String, Instance>;
}
