// src/core/pushmonitor/mod.rs

//! The offline push monitor: tracks the lifecycle of data-ingestion jobs
//! pumping versioned datasets from the log bus into the serving tier.
//!
//! The monitor watches two asynchronous feeds per push — partition status
//! changes from the durable accessor, and routing changes from the routing
//! repository — aggregates them into a per-push status snapshot, and decides
//! through a strategy-dispatched decider when the push has terminally
//! COMPLETED or failed with ERROR. Terminal transitions persist the outcome,
//! update the store catalog (version status, current version), record health
//! stats, and trigger cleanup of old versions and topics. Hybrid stores
//! additionally hand over to buffer replay once the bulk push is consumed.

pub mod accessor;
pub mod decider;
pub mod monitor;
pub mod retention;
pub mod routing;
pub mod stats;
pub mod status;

pub use accessor::{OfflinePushAccessor, PartitionStatusListener};
pub use decider::{OfflinePushStrategy, PushStatusDecider, decider_for};
pub use monitor::PushMonitor;
pub use routing::{
    Instance, Partition, PartitionAssignment, ReplicaState, RoutingDataChangedListener,
    RoutingDataRepository,
};
pub use stats::{PrometheusPushHealthStats, PushHealthStats};
pub use status::{
    ExecutionStatus, IncrementalPushStatus, OfflinePushStatus, PartitionStatus, ReplicaStatus,
};
