// src/core/pushmonitor/monitor.rs

//! The push monitor orchestrator.
//!
//! Holds the topic → push map and drives the push state machine from two
//! asynchronous feeds: partition-status changes reported through the durable
//! accessor, and routing changes reported through the routing repository.
//! Terminal transitions update the store catalog, record health stats, and
//! trigger cleanup of retired versions and topics.
//!
//! Every mutation runs under a single fair write lock; the map itself is a
//! concurrent map so the staleness-tolerant read paths
//! (`get_push_status_and_details`, `get_offline_push_progress`) can skip the
//! lock entirely, the same way the admin read paths do in the rest of the
//! control plane. Mutations clone the published snapshot, mutate the clone,
//! persist it, and only then swap it into the map.

use super::accessor::{OfflinePushAccessor, PartitionStatusListener};
use super::decider::{OfflinePushStrategy, PushStatusDecider, decider_for};
use super::retention;
use super::routing::{
    Instance, PartitionAssignment, RoutingDataChangedListener, RoutingDataRepository,
};
use super::stats::PushHealthStats;
use super::status::{ExecutionStatus, OfflinePushStatus, PartitionStatus};
use crate::config::MonitorConfig;
use crate::core::OpalError;
use crate::core::meta::replication::TopicReplicator;
use crate::core::meta::store::{
    ReadWriteStoreRepository, StoreCleaner, SystemStoreWriter, VersionStatus,
    is_metadata_system_store,
};
use crate::core::meta::topics;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Cluster-scoped monitor for the lifecycle of offline pushes.
pub struct PushMonitor {
    cluster_name: String,
    accessor: Arc<dyn OfflinePushAccessor>,
    store_cleaner: Arc<dyn StoreCleaner>,
    metadata_repository: Arc<dyn ReadWriteStoreRepository>,
    routing_data_repository: Arc<dyn RoutingDataRepository>,
    health_stats: Arc<dyn PushHealthStats>,
    system_store_writer: Arc<dyn SystemStoreWriter>,
    topic_replicator: Option<Arc<dyn TopicReplicator>>,
    skip_buffer_replay_for_hybrid: bool,
    max_error_pushes_to_keep: usize,

    /// The only mutable shared state the monitor owns. Values are snapshots:
    /// published entries are never mutated in place.
    topic_to_push: DashMap<String, OfflinePushStatus>,

    /// Fair write-preferring lock serializing every mutation and event
    /// handler. Tokio's FIFO policy keeps reader bursts from starving the
    /// event writers.
    push_lock: RwLock<()>,

    /// Handle back to the owning `Arc`, used to register the monitor itself
    /// as the listener on both subscription feeds.
    self_ref: Weak<PushMonitor>,
}

impl PushMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cluster_name: impl Into<String>,
        accessor: Arc<dyn OfflinePushAccessor>,
        store_cleaner: Arc<dyn StoreCleaner>,
        metadata_repository: Arc<dyn ReadWriteStoreRepository>,
        routing_data_repository: Arc<dyn RoutingDataRepository>,
        health_stats: Arc<dyn PushHealthStats>,
        system_store_writer: Arc<dyn SystemStoreWriter>,
        topic_replicator: Option<Arc<dyn TopicReplicator>>,
        config: &MonitorConfig,
    ) -> Arc<Self> {
        let cluster_name = cluster_name.into();
        Arc::new_cyclic(|self_ref| Self {
            cluster_name,
            accessor,
            store_cleaner,
            metadata_repository,
            routing_data_repository,
            health_stats,
            system_store_writer,
            topic_replicator,
            skip_buffer_replay_for_hybrid: config.skip_buffer_replay_for_hybrid,
            max_error_pushes_to_keep: config.max_error_pushes_to_keep,
            topic_to_push: DashMap::new(),
            push_lock: RwLock::new(()),
            self_ref: self_ref.clone(),
        })
    }

    fn monitor_arc(&self) -> Arc<PushMonitor> {
        // The caller holds at least one strong reference for `&self` to exist.
        self.self_ref
            .upgrade()
            .expect("push monitor outlives its own method calls")
    }

    fn routing_listener(&self) -> Arc<dyn RoutingDataChangedListener> {
        self.monitor_arc()
    }

    fn partition_status_listener(&self) -> Arc<dyn PartitionStatusListener> {
        self.monitor_arc()
    }

    /// Reconstructs the monitor's state from durable storage on controller
    /// startup.
    pub async fn load_all_pushes(&self) -> Result<(), OpalError> {
        let _guard = self.push_lock.write().await;
        let pushes = self
            .accessor
            .load_offline_push_statuses_and_partition_statuses()
            .await?;
        self.load_all_pushes_locked(pushes).await
    }

    /// Reconstructs the monitor's state from a pre-fetched list of persisted
    /// push statuses.
    pub async fn load_all_pushes_from(
        &self,
        offline_push_statuses: Vec<OfflinePushStatus>,
    ) -> Result<(), OpalError> {
        let _guard = self.push_lock.write().await;
        self.load_all_pushes_locked(offline_push_statuses).await
    }

    async fn load_all_pushes_locked(
        &self,
        offline_push_statuses: Vec<OfflinePushStatus>,
    ) -> Result<(), OpalError> {
        info!("Loading all pushes started for cluster: {}", self.cluster_name);

        // Subscribe to routing changes first, then re-read each status, so
        // the subscription window has no gap: any change event between the
        // original read and the subscription is covered by the re-read.
        let mut refreshed = Vec::with_capacity(offline_push_statuses.len());
        for push in &offline_push_statuses {
            self.routing_data_repository
                .subscribe_routing_data_change(&push.kafka_topic, self.routing_listener())
                .await?;
            refreshed.push(
                self.accessor
                    .get_offline_push_status_and_its_partition_statuses(&push.kafka_topic)
                    .await?,
            );
        }

        for push in refreshed {
            self.topic_to_push
                .insert(push.kafka_topic.clone(), push.clone());
            self.accessor
                .subscribe_partition_status_change(&push, self.partition_status_listener())
                .await?;

            if push.current_status.is_terminal() {
                continue;
            }
            // The controller may have missed notifications during failover;
            // re-decide running pushes from the current routing data.
            if self
                .routing_data_repository
                .contains_topic(&push.kafka_topic)
                .await
            {
                match self
                    .routing_data_repository
                    .get_partition_assignments(&push.kafka_topic)
                    .await
                {
                    Ok(assignment) => {
                        let (status, details) = decider_for(push.strategy)
                            .check_push_status_and_details(&push, &assignment);
                        if status.is_terminal() {
                            info!(
                                "Found an offline push that can be terminated: {} status: {}",
                                push.kafka_topic, status
                            );
                            self.handle_offline_push_update_locked(&push, status, details)
                                .await;
                        }
                    }
                    Err(e) => warn!(
                        "Could not read partition assignments for topic: {}: {}",
                        push.kafka_topic, e
                    ),
                }
            } else {
                // A running push whose version is missing from routing. Only
                // log it: deleting here has caused premature data loss during
                // controller failovers.
                info!("Found a legacy offline push: {}", push.kafka_topic);
            }
        }

        let store_names: HashSet<String> = self
            .topic_to_push
            .iter()
            .map(|entry| topics::store_name_from_topic(entry.key()).to_string())
            .collect();
        for store_name in store_names {
            self.retire_old_error_pushes_locked(&store_name).await;
        }

        info!("Loading all pushes finished for cluster: {}", self.cluster_name);
        Ok(())
    }

    /// Starts monitoring a new push. A leftover ERROR push for the same topic
    /// is cleaned up first; any other existing push is a caller error.
    pub async fn start_monitor_offline_push(
        &self,
        kafka_topic: &str,
        partition_count: u32,
        replication_factor: u32,
        strategy: OfflinePushStrategy,
    ) -> Result<(), OpalError> {
        let _guard = self.push_lock.write().await;

        if let Some(existing) = self.cloned_push(kafka_topic) {
            if existing.current_status == ExecutionStatus::Error {
                info!(
                    "The previous push for topic: {} is in ERROR status, the new push will clean \
                     up the previous push status",
                    kafka_topic
                );
                self.cleanup_push_status_locked(&existing, true).await;
            } else {
                return Err(OpalError::PushAlreadyExists(
                    kafka_topic.to_string(),
                    self.cluster_name.clone(),
                ));
            }
        }

        let push = OfflinePushStatus::new(kafka_topic, partition_count, replication_factor, strategy);
        self.accessor
            .create_offline_push_status_and_its_partition_statuses(&push)
            .await?;
        self.topic_to_push
            .insert(kafka_topic.to_string(), push.clone());

        if let Err(e) = self
            .accessor
            .subscribe_partition_status_change(&push, self.partition_status_listener())
            .await
        {
            self.topic_to_push.remove(kafka_topic);
            return Err(e);
        }
        if let Err(e) = self
            .routing_data_repository
            .subscribe_routing_data_change(kafka_topic, self.routing_listener())
            .await
        {
            // Keep the both-or-neither subscription invariant.
            if let Err(unsub_err) = self
                .accessor
                .unsubscribe_partition_status_change(&push, &self.partition_status_listener())
                .await
            {
                warn!(
                    "Could not roll back partition status subscription for topic: {}: {}",
                    kafka_topic, unsub_err
                );
            }
            self.topic_to_push.remove(kafka_topic);
            return Err(e);
        }

        info!("Started monitoring push on topic: {}", kafka_topic);
        Ok(())
    }

    /// Stops monitoring one push. Unknown topics are a warning, not an error.
    pub async fn stop_monitor_offline_push(
        &self,
        kafka_topic: &str,
        delete_push_status: bool,
    ) -> Result<(), OpalError> {
        info!("Stopping monitoring push on topic: {}", kafka_topic);
        let _guard = self.push_lock.write().await;
        self.stop_monitor_locked(kafka_topic, delete_push_status).await
    }

    async fn stop_monitor_locked(
        &self,
        kafka_topic: &str,
        delete_push_status: bool,
    ) -> Result<(), OpalError> {
        let Some(push) = self.cloned_push(kafka_topic) else {
            warn!(
                "Push status does not exist for topic: {} in cluster: {}",
                kafka_topic, self.cluster_name
            );
            return Ok(());
        };

        self.accessor
            .unsubscribe_partition_status_change(&push, &self.partition_status_listener())
            .await?;
        self.routing_data_repository
            .unsubscribe_routing_data_change(kafka_topic, &self.routing_listener())
            .await?;

        if push.current_status == ExecutionStatus::Error {
            let store_name = topics::store_name_from_topic(kafka_topic);
            self.retire_old_error_pushes_locked(store_name).await;
        } else {
            self.cleanup_push_status_locked(&push, delete_push_status).await;
        }
        info!("Stopped monitoring push on topic: {}", kafka_topic);
        Ok(())
    }

    /// Best-effort stop of every monitored push; failures are logged and do
    /// not abort the loop.
    pub async fn stop_all_monitoring(&self) {
        info!("Stopping monitoring pushes for all topics.");
        let _guard = self.push_lock.write().await;
        let kafka_topics: Vec<String> = self
            .topic_to_push
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for kafka_topic in kafka_topics {
            if let Err(e) = self.stop_monitor_locked(&kafka_topic, false).await {
                error!(
                    "Error when stopping monitoring push for topic: {}: {}",
                    kafka_topic, e
                );
            }
        }
        info!("Stopped monitoring pushes for all topics.");
    }

    /// Removes and durably deletes every push belonging to one store.
    pub async fn cleanup_store_status(&self, store_name: &str) {
        let _guard = self.push_lock.write().await;
        let kafka_topics: Vec<String> = self
            .topic_to_push
            .iter()
            .filter(|entry| topics::store_name_from_topic(entry.key()) == store_name)
            .map(|entry| entry.key().clone())
            .collect();
        for kafka_topic in kafka_topics {
            if let Some(push) = self.cloned_push(&kafka_topic) {
                self.cleanup_push_status_locked(&push, true).await;
            }
        }
    }

    /// Read-locked lookup of one push snapshot.
    pub async fn get_offline_push(&self, kafka_topic: &str) -> Result<OfflinePushStatus, OpalError> {
        let _guard = self.push_lock.read().await;
        self.cloned_push(kafka_topic)
            .ok_or_else(|| OpalError::PushNotFound(kafka_topic.to_string()))
    }

    /// Convenience over `get_push_status_and_details`.
    pub fn get_push_status(&self, kafka_topic: &str) -> ExecutionStatus {
        self.get_push_status_and_details(kafka_topic, None).0
    }

    /// Current status and optional detail of a push. Absent pushes report
    /// NOT_CREATED. With an incremental version, reports the status of that
    /// incremental push rather than the overall push.
    ///
    /// Lock-free read; tolerates a slightly stale snapshot.
    pub fn get_push_status_and_details(
        &self,
        kafka_topic: &str,
        incremental_push_version: Option<&str>,
    ) -> (ExecutionStatus, Option<String>) {
        let Some(push) = self.topic_to_push.get(kafka_topic) else {
            return (
                ExecutionStatus::NotCreated,
                Some("Offline job hasn't been created yet.".to_string()),
            );
        };
        if let Some(incremental_version) = incremental_push_version {
            return (push.check_incremental_push_status(incremental_version), None);
        }
        (push.current_status, push.status_details.clone())
    }

    /// Topics whose push is currently STARTED.
    pub async fn get_topics_of_ongoing_offline_pushes(&self) -> Vec<String> {
        let _guard = self.push_lock.read().await;
        self.topic_to_push
            .iter()
            .filter(|entry| entry.value().current_status == ExecutionStatus::Started)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Per-replica consumed-message counts for one push, with replicas on
    /// dead instances filtered out against the current live-instance set.
    ///
    /// Lock-free read; tolerates a slightly stale snapshot.
    pub async fn get_offline_push_progress(&self, kafka_topic: &str) -> HashMap<String, u64> {
        let Some(push) = self.topic_to_push.get(kafka_topic).map(|p| p.clone()) else {
            return HashMap::new();
        };
        let mut progress = push.progress();
        let live_instances = self.routing_data_repository.get_live_instances().await;
        progress.retain(|replica_id, _| {
            live_instances.contains_key(topics::instance_id_from_replica_id(replica_id))
        });
        progress
    }

    /// Drives a push to ERROR with the given details. Unknown topics are a
    /// warning, not an error.
    pub async fn mark_offline_push_as_error(&self, kafka_topic: &str, status_details: &str) {
        let _guard = self.push_lock.write().await;
        let Some(push) = self.cloned_push(kafka_topic) else {
            warn!(
                "Could not find an offline push for topic: {}, ignoring the request to mark it \
                 as ERROR",
                kafka_topic
            );
            return;
        };
        self.handle_offline_push_update_locked(
            &push,
            ExecutionStatus::Error,
            Some(status_details.to_string()),
        )
        .await;
    }

    /// Dry run: would the push fail under a hypothetical partition
    /// assignment? Pushes no longer in the map have already settled and
    /// cannot fail.
    pub async fn would_job_fail(
        &self,
        kafka_topic: &str,
        partition_assignment_after_removing: &PartitionAssignment,
    ) -> bool {
        let _guard = self.push_lock.read().await;
        let Some(push) = self.cloned_push(kafka_topic) else {
            return false;
        };
        let (status, _) = decider_for(push.strategy)
            .check_push_status_and_details(&push, partition_assignment_after_removing);
        status == ExecutionStatus::Error
    }

    /// Instances the query-routing side may serve a partition from, per the
    /// push's strategy. Falls back to the default strategy when the push has
    /// already settled out of the map.
    pub fn get_ready_to_serve_instances<'a>(
        &self,
        partition_assignment: &'a PartitionAssignment,
        partition_id: u32,
    ) -> Vec<&'a Instance> {
        let strategy = self
            .topic_to_push
            .get(&partition_assignment.topic)
            .map(|push| push.strategy)
            .unwrap_or(OfflinePushStrategy::WaitNMinusOneReplicaPerPartition);
        decider_for(strategy).get_ready_to_serve_instances(partition_assignment, partition_id)
    }

    /// Forwards the preparation wait time of a push to the health stats sink.
    pub fn record_push_preparation_duration(&self, kafka_topic: &str, wait_time_sec: u64) {
        let store_name = topics::store_name_from_topic(kafka_topic);
        self.health_stats
            .record_push_preparation_duration(store_name, wait_time_sec);
    }

    /// Re-reads the push from the map and applies the update only when the
    /// transition is legal; illegal transitions are skipped with a log line.
    pub async fn refresh_and_update_push_status(
        &self,
        kafka_topic: &str,
        new_status: ExecutionStatus,
        new_status_details: Option<String>,
    ) -> Result<(), OpalError> {
        let _guard = self.push_lock.write().await;
        let refreshed = self
            .cloned_push(kafka_topic)
            .ok_or_else(|| OpalError::PushNotFound(kafka_topic.to_string()))?;
        if refreshed.validate_status_transition(new_status) {
            self.update_push_status_locked(&refreshed, new_status, new_status_details)
                .await
        } else {
            info!(
                "Refreshed push status for topic: {} does not allow transitioning to {}, because \
                 it is currently in: {} status, skipping the status update",
                kafka_topic, new_status, refreshed.current_status
            );
            Ok(())
        }
    }

    // --- internals -------------------------------------------------------

    fn cloned_push(&self, kafka_topic: &str) -> Option<OfflinePushStatus> {
        self.topic_to_push.get(kafka_topic).map(|entry| entry.clone())
    }

    fn duration_in_sec(&self, push: &OfflinePushStatus) -> u64 {
        now_secs().saturating_sub(push.start_time_sec)
    }

    /// Removes a push from the map, releasing its partition-status
    /// subscription and optionally deleting it durably. Failures are logged
    /// only; retention will re-collect the leftovers.
    async fn cleanup_push_status_locked(&self, push: &OfflinePushStatus, delete_push_status: bool) {
        if let Err(e) = self
            .accessor
            .unsubscribe_partition_status_change(push, &self.partition_status_listener())
            .await
        {
            warn!(
                "Could not unsubscribe partition status changes for topic: {}: {}",
                push.kafka_topic, e
            );
        }
        self.topic_to_push.remove(&push.kafka_topic);
        if delete_push_status {
            if let Err(e) = self
                .accessor
                .delete_offline_push_status_and_its_partition_statuses(&push.kafka_topic)
                .await
            {
                warn!(
                    "Could not delete push status for topic: {}: {}",
                    push.kafka_topic, e
                );
            }
        }
    }

    /// Retires the oldest ERROR pushes of one store beyond the retention cap.
    async fn retire_old_error_pushes_locked(&self, store_name: &str) {
        let version_to_status: BTreeMap<i32, ExecutionStatus> = self
            .topic_to_push
            .iter()
            .filter(|entry| topics::store_name_from_topic(entry.key()) == store_name)
            .map(|entry| {
                (
                    topics::version_from_topic(entry.key()),
                    entry.value().current_status,
                )
            })
            .collect();

        for version in
            retention::select_error_versions_to_retire(&version_to_status, self.max_error_pushes_to_keep)
        {
            let kafka_topic = topics::compose_version_topic(store_name, version);
            if let Some(push) = self.cloned_push(&kafka_topic) {
                info!("Retiring old ERROR push for topic: {}", kafka_topic);
                self.cleanup_push_status_locked(&push, true).await;
            }
        }
    }

    /// The single funnel for status writes: validates the transition, clones
    /// the snapshot, persists the clone durably, then swaps it into the map.
    ///
    /// Terminal transitions must go through `handle_offline_push_update_locked`
    /// instead, so their side effects run.
    async fn update_push_status_locked(
        &self,
        push: &OfflinePushStatus,
        new_status: ExecutionStatus,
        new_status_details: Option<String>,
    ) -> Result<(), OpalError> {
        if !push.validate_status_transition(new_status) {
            warn!(
                "Push status transition from {} to {} is not valid for topic: {}, skipping the \
                 status update",
                push.current_status, new_status, push.kafka_topic
            );
            return Ok(());
        }
        let mut cloned = push.clone();
        cloned.update_status(new_status, new_status_details);
        // Durable first, then the in-memory swap: a crash must leave durable
        // state at least as advanced as memory on recovery.
        self.accessor.update_offline_push_status(&cloned).await?;
        self.topic_to_push.insert(cloned.kafka_topic.clone(), cloned);
        Ok(())
    }

    /// Terminal-transition funnel. Unsubscribes from routing changes first,
    /// so no late routing event can reopen a terminal state, then runs the
    /// status-specific side effects.
    async fn handle_offline_push_update_locked(
        &self,
        push: &OfflinePushStatus,
        new_status: ExecutionStatus,
        new_status_details: Option<String>,
    ) {
        if let Err(e) = self
            .routing_data_repository
            .unsubscribe_routing_data_change(&push.kafka_topic, &self.routing_listener())
            .await
        {
            warn!(
                "Could not unsubscribe routing data changes for topic: {}: {}",
                push.kafka_topic, e
            );
        }

        match new_status {
            ExecutionStatus::Completed => self.handle_completed_push_locked(push).await,
            ExecutionStatus::Error => {
                let details = match new_status_details {
                    Some(details) => details,
                    None => {
                        error!(
                            "Status details should be provided when terminating the offline push \
                             for topic: {}, but they are missing",
                            push.kafka_topic
                        );
                        "STATUS DETAILS ABSENT.".to_string()
                    }
                };
                self.handle_error_push_locked(push, details).await;
            }
            other => warn!(
                "Ignoring non-terminal status update to {} for topic: {}",
                other, push.kafka_topic
            ),
        }
    }

    async fn handle_completed_push_locked(&self, push: &OfflinePushStatus) {
        info!(
            "Updating offline push status for topic: {} from: {} to: {}",
            push.kafka_topic,
            push.current_status,
            ExecutionStatus::Completed
        );

        if let Err(e) = self
            .update_push_status_locked(push, ExecutionStatus::Completed, None)
            .await
        {
            warn!(
                "Could not persist COMPLETED status for topic: {}: {}",
                push.kafka_topic, e
            );
            return;
        }

        let store_name = topics::store_name_from_topic(&push.kafka_topic);
        let version_number = topics::version_from_topic(&push.kafka_topic);
        if let Err(e) = self
            .update_store_version_status(store_name, version_number, VersionStatus::Online)
            .await
        {
            error!(
                "Could not update version status for store: {} version: {}: {}",
                store_name, version_number, e
            );
        }
        self.health_stats
            .record_successful_push(store_name, self.duration_in_sec(push));

        // Cleanup failures must not abort the completion; leftovers are
        // re-collected when the next push for this store completes.
        if let Err(e) = self
            .store_cleaner
            .topic_cleanup_when_push_complete(&self.cluster_name, store_name, version_number)
            .await
        {
            warn!(
                "Could not perform topic cleanup when the push completed for topic: {} in \
                 cluster: {}: {}",
                push.kafka_topic, self.cluster_name, e
            );
        }
        if let Err(e) = self
            .store_cleaner
            .retire_old_store_versions(&self.cluster_name, store_name, false)
            .await
        {
            warn!(
                "Could not retire the old versions for store: {} in cluster: {}: {}",
                store_name, self.cluster_name, e
            );
        }
        info!("Offline push for topic: {} is completed.", push.kafka_topic);
    }

    async fn handle_error_push_locked(&self, push: &OfflinePushStatus, status_details: String) {
        info!(
            "Updating offline push status for topic: {} from: {} to: {}, status details: {}",
            push.kafka_topic,
            push.current_status,
            ExecutionStatus::Error,
            status_details
        );

        if let Err(e) = self
            .update_push_status_locked(push, ExecutionStatus::Error, Some(status_details))
            .await
        {
            warn!(
                "Could not persist ERROR status for topic: {}: {}",
                push.kafka_topic, e
            );
            return;
        }

        let store_name = topics::store_name_from_topic(&push.kafka_topic);
        let version_number = topics::version_from_topic(&push.kafka_topic);
        let result: Result<(), OpalError> = async {
            self.update_store_version_status(store_name, version_number, VersionStatus::Error)
                .await?;
            self.health_stats
                .record_failed_push(store_name, self.duration_in_sec(push));
            if !is_metadata_system_store(store_name) {
                // Shared system-store versions are not deleted on a single
                // push failure.
                self.store_cleaner
                    .delete_one_store_version(&self.cluster_name, store_name, version_number)
                    .await?;
            }
            Ok(())
        }
        .await;
        if let Err(e) = result {
            warn!(
                "Could not delete error version: {} for store: {} in cluster: {}: {}",
                version_number, store_name, self.cluster_name, e
            );
        }
        info!("Offline push for topic: {} failed.", push.kafka_topic);
    }

    /// Sets the status of one store version in the catalog, adjusting the
    /// store's current version when a new version comes online.
    ///
    /// Lock ordering: the monitor lock is always acquired before the store
    /// repository's internal lock, never the reverse.
    async fn update_store_version_status(
        &self,
        store_name: &str,
        version_number: i32,
        status: VersionStatus,
    ) -> Result<(), OpalError> {
        if is_metadata_system_store(store_name) {
            // Shared system-store version statuses are platform-managed.
            return Ok(());
        }

        let mut store = self
            .metadata_repository
            .get_store(store_name)
            .await
            .ok_or_else(|| OpalError::StoreNotFound(store_name.to_string()))?;

        let mut new_status = status;
        if !store.enable_writes && status == VersionStatus::Online {
            new_status = VersionStatus::Pushed;
        }

        store.update_version_status(version_number, new_status)?;
        info!(
            "Updated store: {} version: {} to status: {:?}",
            store.name, version_number, new_status
        );
        if new_status == VersionStatus::Online {
            if version_number > store.current_version {
                store.current_version = version_number;
            } else {
                info!(
                    "Current version for store: {}: {} is newer than the given version: {}, the \
                     current version will not be changed",
                    store.name, store.current_version, version_number
                );
            }
        }
        self.metadata_repository.update_store(&store).await?;

        if store.store_metadata_system_store_enabled {
            self.system_store_writer
                .write_current_version_states(
                    &self.cluster_name,
                    store_name,
                    &store.versions,
                    store.current_version,
                )
                .await?;
        }
        Ok(())
    }

    /// Hybrid-store handover: once every partition has consumed through the
    /// end-of-push marker, kick off buffer replay from the real-time topic
    /// (or skip it when configured to) and move the push to
    /// END_OF_PUSH_RECEIVED.
    ///
    /// Fails only when the store is truly absent from the catalog even after
    /// a refresh; that is an invariant violation the caller must surface.
    async fn check_whether_to_start_buffer_replay_locked(
        &self,
        push: &OfflinePushStatus,
    ) -> Result<(), OpalError> {
        let store_name = topics::store_name_from_topic(&push.kafka_topic);
        let store = match self.metadata_repository.get_store(store_name).await {
            Some(store) => store,
            None => {
                info!(
                    "Got no store from the metadata repository for store name: '{}', will \
                     attempt a refresh",
                    store_name
                );
                // TODO: refresh re-reads every store's metadata; cache
                // per-store misses instead once the repository supports it.
                self.metadata_repository.refresh().await;
                match self.metadata_repository.get_store(store_name).await {
                    Some(store) => {
                        info!(
                            "The metadata repository refresh allowed us to retrieve store: '{}'",
                            store_name
                        );
                        store
                    }
                    None => {
                        return Err(OpalError::InvalidState(format!(
                            "Could not find a store named '{store_name}' in the metadata \
                             repository, even after a refresh!"
                        )));
                    }
                }
            }
        };

        if !store.is_hybrid() {
            return Ok(());
        }
        if !push.is_ready_to_start_buffer_replay() {
            debug!("{} is not ready to start buffer replay.", push.kafka_topic);
            return Ok(());
        }
        info!("{} is ready to start buffer replay.", push.kafka_topic);

        if self.topic_replicator.is_none() && !self.skip_buffer_replay_for_hybrid {
            let details = "The TopicReplicator was not properly initialized!";
            error!("{}", details);
            self.handle_offline_push_update_locked(
                push,
                ExecutionStatus::Error,
                Some(details.to_string()),
            )
            .await;
            return Ok(());
        }

        let kickoff: Result<String, OpalError> = if self.skip_buffer_replay_for_hybrid {
            info!(
                "Skipping buffer replay for hybrid store version: {}",
                push.kafka_topic
            );
            Ok("skipped buffer replay".to_string())
        } else {
            let replicator = self
                .topic_replicator
                .as_ref()
                .expect("replicator presence checked above");
            replicator
                .prepare_and_start_replication(
                    &topics::compose_real_time_topic(store_name),
                    &push.kafka_topic,
                    &store,
                )
                .await
                .map(|()| "kicked off buffer replay".to_string())
        };

        let persisted = match kickoff {
            Ok(details) => self
                .update_push_status_locked(
                    push,
                    ExecutionStatus::EndOfPushReceived,
                    Some(details.clone()),
                )
                .await
                .map(|()| details),
            Err(e) => Err(e),
        };
        match persisted {
            Ok(details) => info!(
                "Successfully {} for offline push: {}",
                details, push.kafka_topic
            ),
            Err(e) => {
                let details = "Failed to kick off the buffer replay";
                error!("{} for offline push: {}: {}", details, push.kafka_topic, e);
                self.handle_offline_push_update_locked(
                    push,
                    ExecutionStatus::Error,
                    Some(details.to_string()),
                )
                .await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PartitionStatusListener for PushMonitor {
    async fn on_partition_status_change(
        &self,
        topic: &str,
        partition_status: PartitionStatus,
    ) -> Result<(), OpalError> {
        let _guard = self.push_lock.write().await;
        // TODO: lock per push instead of the whole map once event volume
        // warrants finer-grained concurrency control.
        let Some(push) = self.cloned_push(topic) else {
            error!(
                "Could not find an offline push for topic: {}, ignoring the partition status \
                 change notification",
                topic
            );
            return Ok(());
        };

        // Partition status is read-only on the controller side; it is only
        // ever produced by storage nodes. Clone, overwrite, swap.
        let mut cloned = push.clone();
        if let Err(e) = cloned.set_partition_status(partition_status) {
            error!(
                "Dropping partition status change notification for topic: {}: {}",
                topic, e
            );
            return Ok(());
        }
        self.topic_to_push.insert(topic.to_string(), cloned.clone());

        self.check_whether_to_start_buffer_replay_locked(&cloned).await
    }
}

#[async_trait]
impl RoutingDataChangedListener for PushMonitor {
    async fn on_external_view_change(
        &self,
        partition_assignment: PartitionAssignment,
    ) -> Result<(), OpalError> {
        let _guard = self.push_lock.write().await;
        let kafka_topic = partition_assignment.topic.clone();
        info!(
            "Received the routing data changed notification for topic: {}",
            kafka_topic
        );

        let Some(push) = self.cloned_push(&kafka_topic) else {
            info!(
                "Could not find a running offline push for topic: {}, ignoring the routing data \
                 changed notification",
                kafka_topic
            );
            return Ok(());
        };

        let previous_status = push.current_status;
        if previous_status == ExecutionStatus::Completed || previous_status == ExecutionStatus::Error
        {
            warn!(
                "Skipping updating push status for topic: {} since it is already in: {}",
                kafka_topic, previous_status
            );
            return Ok(());
        }

        let (status, details) =
            decider_for(push.strategy).check_push_status_and_details(&push, &partition_assignment);
        // Only terminal decisions are acted on at this entry point.
        if status != previous_status && status.is_terminal() {
            info!(
                "Offline push status will be changed to {} for topic: {} from status: {}",
                status, kafka_topic, previous_status
            );
            self.handle_offline_push_update_locked(&push, status, details)
                .await;
        }
        Ok(())
    }

    async fn on_routing_data_deleted(&self, kafka_topic: &str) -> Result<(), OpalError> {
        // Besides the external view, the ideal state matters here: if the
        // resource was deleted from the external view by mistake, the cluster
        // manager recovers it automatically as long as it remains in the
        // ideal state, and the push keeps working.
        if self
            .routing_data_repository
            .resources_exist_in_ideal_state(kafka_topic)
            .await
        {
            warn!(
                "Resource for topic: {} remains in the ideal state, ignoring the deletion in the \
                 external view",
                kafka_topic
            );
            return Ok(());
        }

        let push = {
            let _guard = self.push_lock.read().await;
            self.cloned_push(kafka_topic)
        };
        if push.map(|p| p.current_status) != Some(ExecutionStatus::Started) {
            return Ok(());
        }

        let _guard = self.push_lock.write().await;
        // Re-check under the write lock; the push may have settled meanwhile.
        let Some(push) = self.cloned_push(kafka_topic) else {
            return Ok(());
        };
        if push.current_status == ExecutionStatus::Started {
            let status_details = format!(
                "Helix resource for topic: {kafka_topic} is deleted, stopping the running push"
            );
            info!("{}", status_details);
            self.handle_offline_push_update_locked(
                &push,
                ExecutionStatus::Error,
                Some(status_details),
            )
            .await;
        }
        Ok(())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
