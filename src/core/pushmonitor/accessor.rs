// src/core/pushmonitor/accessor.rs

//! Durable storage interface for push and partition statuses, plus the
//! partition-status change subscription the monitor consumes.

use super::status::{OfflinePushStatus, PartitionStatus};
use crate::core::OpalError;
use async_trait::async_trait;
use std::sync::Arc;

/// Callback interface through which the accessor delivers partition status
/// updates reported by storage nodes.
#[async_trait]
pub trait PartitionStatusListener: Send + Sync {
    /// One partition of one push got a fresh set of replica statuses.
    async fn on_partition_status_change(
        &self,
        topic: &str,
        partition_status: PartitionStatus,
    ) -> Result<(), OpalError>;
}

/// Durable KV storage for push statuses and their partition statuses.
///
/// A successful `update_offline_push_status` must be durable before it
/// returns; the monitor swaps its in-memory copy only afterwards, so a crash
/// leaves durable state at least as advanced as memory.
#[async_trait]
pub trait OfflinePushAccessor: Send + Sync {
    /// Persists a brand-new push status together with its (empty) partition
    /// statuses.
    async fn create_offline_push_status_and_its_partition_statuses(
        &self,
        push: &OfflinePushStatus,
    ) -> Result<(), OpalError>;

    /// Persists an updated push-level status.
    async fn update_offline_push_status(&self, push: &OfflinePushStatus)
    -> Result<(), OpalError>;

    /// Deletes a push status and all of its partition statuses.
    async fn delete_offline_push_status_and_its_partition_statuses(
        &self,
        topic: &str,
    ) -> Result<(), OpalError>;

    /// Loads every persisted push status with its partition statuses.
    async fn load_offline_push_statuses_and_partition_statuses(
        &self,
    ) -> Result<Vec<OfflinePushStatus>, OpalError>;

    /// Re-reads one push status with its partition statuses.
    async fn get_offline_push_status_and_its_partition_statuses(
        &self,
        topic: &str,
    ) -> Result<OfflinePushStatus, OpalError>;

    /// Registers a listener for partition status changes of one push.
    async fn subscribe_partition_status_change(
        &self,
        push: &OfflinePushStatus,
        listener: Arc<dyn PartitionStatusListener>,
    ) -> Result<(), OpalError>;

    /// Removes a previously registered partition status listener.
    async fn unsubscribe_partition_status_change(
        &self,
        push: &OfflinePushStatus,
        listener: &Arc<dyn PartitionStatusListener>,
    ) -> Result<(), OpalError>;
}
