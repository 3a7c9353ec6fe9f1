// src/core/meta/replication.rs

//! Interface to the topic replicator that pumps a hybrid store's real-time
//! topic into a version topic (buffer replay).

use super::store::Store;
use crate::core::OpalError;
use async_trait::async_trait;

/// Starts replication from a real-time topic into a version topic.
#[async_trait]
pub trait TopicReplicator: Send + Sync {
    /// Prepares offsets and begins replicating `real_time_topic` into
    /// `version_topic` according to the store's hybrid configuration.
    async fn prepare_and_start_replication(
        &self,
        real_time_topic: &str,
        version_topic: &str,
        store: &Store,
    ) -> Result<(), OpalError>;
}
