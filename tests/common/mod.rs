// tests/common/mod.rs

//! Common test fixtures: in-memory implementations of the interfaces the
//! push monitor consumes, plus builders for assignments, partition statuses,
//! and stores.
//!
//! **Note:** Some fixtures may not be used in all tests yet,
//! but they are available for use when needed.

#![allow(dead_code)]

use async_trait::async_trait;
use opal::config::MonitorConfig;
use opal::core::OpalError;
use opal::core::meta::replication::TopicReplicator;
use opal::core::meta::store::{
    HybridStoreConfig, ReadWriteStoreRepository, Store, StoreCleaner, SystemStoreWriter, Version,
};
use opal::pushmonitor::{
    ExecutionStatus, Instance, OfflinePushAccessor, OfflinePushStatus, Partition,
    PartitionAssignment, PartitionStatus, PartitionStatusListener, PushHealthStats, PushMonitor,
    ReplicaState, RoutingDataChangedListener, RoutingDataRepository,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const CLUSTER: &str = "cluster-test";

/// In-memory durable accessor.
#[derive(Default)]
pub struct InMemoryOfflinePushAccessor {
    pushes: Mutex<HashMap<String, OfflinePushStatus>>,
    subscribed_topics: Mutex<HashSet<String>>,
}

impl InMemoryOfflinePushAccessor {
    /// Seeds a persisted push without going through the monitor, as if a
    /// previous controller had written it.
    pub fn seed(&self, push: OfflinePushStatus) {
        self.pushes
            .lock()
            .unwrap()
            .insert(push.kafka_topic.clone(), push);
    }

    pub fn persisted(&self, topic: &str) -> Option<OfflinePushStatus> {
        self.pushes.lock().unwrap().get(topic).cloned()
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscribed_topics.lock().unwrap().contains(topic)
    }
}

#[async_trait]
impl OfflinePushAccessor for InMemoryOfflinePushAccessor {
    async fn create_offline_push_status_and_its_partition_statuses(
        &self,
        push: &OfflinePushStatus,
    ) -> Result<(), OpalError> {
        self.pushes
            .lock()
            .unwrap()
            .insert(push.kafka_topic.clone(), push.clone());
        Ok(())
    }

    async fn update_offline_push_status(
        &self,
        push: &OfflinePushStatus,
    ) -> Result<(), OpalError> {
        self.pushes
            .lock()
            .unwrap()
            .insert(push.kafka_topic.clone(), push.clone());
        Ok(())
    }

    async fn delete_offline_push_status_and_its_partition_statuses(
        &self,
        topic: &str,
    ) -> Result<(), OpalError> {
        self.pushes.lock().unwrap().remove(topic);
        Ok(())
    }

    async fn load_offline_push_statuses_and_partition_statuses(
        &self,
    ) -> Result<Vec<OfflinePushStatus>, OpalError> {
        Ok(self.pushes.lock().unwrap().values().cloned().collect())
    }

    async fn get_offline_push_status_and_its_partition_statuses(
        &self,
        topic: &str,
    ) -> Result<OfflinePushStatus, OpalError> {
        self.pushes
            .lock()
            .unwrap()
            .get(topic)
            .cloned()
            .ok_or_else(|| OpalError::Accessor(format!("no persisted push status for {topic}")))
    }

    async fn subscribe_partition_status_change(
        &self,
        push: &OfflinePushStatus,
        _listener: Arc<dyn PartitionStatusListener>,
    ) -> Result<(), OpalError> {
        self.subscribed_topics
            .lock()
            .unwrap()
            .insert(push.kafka_topic.clone());
        Ok(())
    }

    async fn unsubscribe_partition_status_change(
        &self,
        push: &OfflinePushStatus,
        _listener: &Arc<dyn PartitionStatusListener>,
    ) -> Result<(), OpalError> {
        self.subscribed_topics.lock().unwrap().remove(&push.kafka_topic);
        Ok(())
    }
}

/// In-memory routing repository.
#[derive(Default)]
pub struct MockRoutingDataRepository {
    assignments: Mutex<HashMap<String, PartitionAssignment>>,
    live_instances: Mutex<HashMap<String, Instance>>,
    ideal_state_topics: Mutex<HashSet<String>>,
    subscribed_topics: Mutex<HashSet<String>>,
}

impl MockRoutingDataRepository {
    pub fn set_assignment(&self, topic: &str, assignment: PartitionAssignment) {
        self.assignments
            .lock()
            .unwrap()
            .insert(topic.to_string(), assignment);
    }

    pub fn set_live_instances(&self, node_ids: &[&str]) {
        let mut live = self.live_instances.lock().unwrap();
        live.clear();
        for node_id in node_ids {
            live.insert(node_id.to_string(), instance(node_id));
        }
    }

    pub fn add_to_ideal_state(&self, topic: &str) {
        self.ideal_state_topics
            .lock()
            .unwrap()
            .insert(topic.to_string());
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscribed_topics.lock().unwrap().contains(topic)
    }
}

#[async_trait]
impl RoutingDataRepository for MockRoutingDataRepository {
    async fn subscribe_routing_data_change(
        &self,
        topic: &str,
        _listener: Arc<dyn RoutingDataChangedListener>,
    ) -> Result<(), OpalError> {
        self.subscribed_topics.lock().unwrap().insert(topic.to_string());
        Ok(())
    }

    async fn unsubscribe_routing_data_change(
        &self,
        topic: &str,
        _listener: &Arc<dyn RoutingDataChangedListener>,
    ) -> Result<(), OpalError> {
        self.subscribed_topics.lock().unwrap().remove(topic);
        Ok(())
    }

    async fn contains_topic(&self, topic: &str) -> bool {
        self.assignments.lock().unwrap().contains_key(topic)
    }

    async fn resources_exist_in_ideal_state(&self, topic: &str) -> bool {
        self.ideal_state_topics.lock().unwrap().contains(topic)
    }

    async fn get_partition_assignments(
        &self,
        topic: &str,
    ) -> Result<PartitionAssignment, OpalError> {
        self.assignments
            .lock()
            .unwrap()
            .get(topic)
            .cloned()
            .ok_or_else(|| OpalError::Routing(format!("no partition assignment for {topic}")))
    }

    async fn get_live_instances(&self) -> HashMap<String, Instance> {
        self.live_instances.lock().unwrap().clone()
    }
}

/// In-memory store catalog. Stores added with `insert_hidden` only become
/// visible after a `refresh`, to exercise the miss-then-refresh path.
#[derive(Default)]
pub struct InMemoryStoreRepository {
    stores: Mutex<HashMap<String, Store>>,
    hidden: Mutex<HashMap<String, Store>>,
    refresh_calls: AtomicUsize,
}

impl InMemoryStoreRepository {
    pub fn insert(&self, store: Store) {
        self.stores.lock().unwrap().insert(store.name.clone(), store);
    }

    pub fn insert_hidden(&self, store: Store) {
        self.hidden.lock().unwrap().insert(store.name.clone(), store);
    }

    pub fn get(&self, name: &str) -> Option<Store> {
        self.stores.lock().unwrap().get(name).cloned()
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadWriteStoreRepository for InMemoryStoreRepository {
    async fn get_store(&self, store_name: &str) -> Option<Store> {
        self.stores.lock().unwrap().get(store_name).cloned()
    }

    async fn update_store(&self, store: &Store) -> Result<(), OpalError> {
        self.stores
            .lock()
            .unwrap()
            .insert(store.name.clone(), store.clone());
        Ok(())
    }

    async fn refresh(&self) {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let mut hidden = self.hidden.lock().unwrap();
        let mut stores = self.stores.lock().unwrap();
        for (name, store) in hidden.drain() {
            stores.insert(name, store);
        }
    }
}

/// Records cleaner invocations; each operation can be told to fail.
#[derive(Default)]
pub struct RecordingStoreCleaner {
    pub topic_cleanups: Mutex<Vec<(String, i32)>>,
    pub retired_stores: Mutex<Vec<String>>,
    pub deleted_versions: Mutex<Vec<(String, i32)>>,
    pub fail_topic_cleanup: AtomicBool,
    pub fail_retire: AtomicBool,
    pub fail_delete: AtomicBool,
}

#[async_trait]
impl StoreCleaner for RecordingStoreCleaner {
    async fn topic_cleanup_when_push_complete(
        &self,
        _cluster_name: &str,
        store_name: &str,
        version_number: i32,
    ) -> Result<(), OpalError> {
        if self.fail_topic_cleanup.load(Ordering::SeqCst) {
            return Err(OpalError::Internal("injected topic cleanup failure".into()));
        }
        self.topic_cleanups
            .lock()
            .unwrap()
            .push((store_name.to_string(), version_number));
        Ok(())
    }

    async fn retire_old_store_versions(
        &self,
        _cluster_name: &str,
        store_name: &str,
        _delete_backup_versions: bool,
    ) -> Result<(), OpalError> {
        if self.fail_retire.load(Ordering::SeqCst) {
            return Err(OpalError::Internal("injected retire failure".into()));
        }
        self.retired_stores.lock().unwrap().push(store_name.to_string());
        Ok(())
    }

    async fn delete_one_store_version(
        &self,
        _cluster_name: &str,
        store_name: &str,
        version_number: i32,
    ) -> Result<(), OpalError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(OpalError::Internal("injected delete failure".into()));
        }
        self.deleted_versions
            .lock()
            .unwrap()
            .push((store_name.to_string(), version_number));
        Ok(())
    }
}

/// Records replication kickoffs; can be told to fail.
#[derive(Default)]
pub struct RecordingTopicReplicator {
    pub calls: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl TopicReplicator for RecordingTopicReplicator {
    async fn prepare_and_start_replication(
        &self,
        real_time_topic: &str,
        version_topic: &str,
        _store: &Store,
    ) -> Result<(), OpalError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(OpalError::Replication("injected replication failure".into()));
        }
        self.calls
            .lock()
            .unwrap()
            .push((real_time_topic.to_string(), version_topic.to_string()));
        Ok(())
    }
}

/// Records system-store writes.
#[derive(Default)]
pub struct RecordingSystemStoreWriter {
    pub writes: Mutex<Vec<(String, i32)>>,
}

#[async_trait]
impl SystemStoreWriter for RecordingSystemStoreWriter {
    async fn write_current_version_states(
        &self,
        _cluster_name: &str,
        store_name: &str,
        _versions: &[Version],
        current_version: i32,
    ) -> Result<(), OpalError> {
        self.writes
            .lock()
            .unwrap()
            .push((store_name.to_string(), current_version));
        Ok(())
    }
}

/// Records health-stats sink calls.
#[derive(Default)]
pub struct RecordingPushHealthStats {
    pub successes: Mutex<Vec<String>>,
    pub failures: Mutex<Vec<String>>,
    pub preparations: Mutex<Vec<(String, u64)>>,
}

impl PushHealthStats for RecordingPushHealthStats {
    fn record_successful_push(&self, store_name: &str, _duration_sec: u64) {
        self.successes.lock().unwrap().push(store_name.to_string());
    }

    fn record_failed_push(&self, store_name: &str, _duration_sec: u64) {
        self.failures.lock().unwrap().push(store_name.to_string());
    }

    fn record_push_preparation_duration(&self, store_name: &str, wait_sec: u64) {
        self.preparations
            .lock()
            .unwrap()
            .push((store_name.to_string(), wait_sec));
    }
}

/// Everything a monitor test needs, wired together.
pub struct Harness {
    pub accessor: Arc<InMemoryOfflinePushAccessor>,
    pub routing: Arc<MockRoutingDataRepository>,
    pub stores: Arc<InMemoryStoreRepository>,
    pub cleaner: Arc<RecordingStoreCleaner>,
    pub replicator: Arc<RecordingTopicReplicator>,
    pub system_writer: Arc<RecordingSystemStoreWriter>,
    pub stats: Arc<RecordingPushHealthStats>,
    pub monitor: Arc<PushMonitor>,
}

pub fn build_harness(config: MonitorConfig, with_replicator: bool) -> Harness {
    let accessor = Arc::new(InMemoryOfflinePushAccessor::default());
    let routing = Arc::new(MockRoutingDataRepository::default());
    let stores = Arc::new(InMemoryStoreRepository::default());
    let cleaner = Arc::new(RecordingStoreCleaner::default());
    let replicator = Arc::new(RecordingTopicReplicator::default());
    let system_writer = Arc::new(RecordingSystemStoreWriter::default());
    let stats = Arc::new(RecordingPushHealthStats::default());

    let monitor = PushMonitor::new(
        CLUSTER,
        accessor.clone(),
        cleaner.clone(),
        stores.clone(),
        routing.clone(),
        stats.clone(),
        system_writer.clone(),
        with_replicator.then(|| Arc::clone(&replicator) as Arc<dyn TopicReplicator>),
        &config,
    );

    Harness {
        accessor,
        routing,
        stores,
        cleaner,
        replicator,
        system_writer,
        stats,
        monitor,
    }
}

pub fn harness() -> Harness {
    build_harness(MonitorConfig::default(), true)
}

pub fn instance(node_id: &str) -> Instance {
    Instance::new(node_id, "localhost", 7072)
}

/// An assignment where every partition has all the given instances ONLINE.
pub fn online_assignment(
    topic: &str,
    partition_count: u32,
    node_ids: &[&str],
) -> PartitionAssignment {
    let mut assignment = PartitionAssignment::new(topic, partition_count);
    for id in 0..partition_count {
        let mut partition = Partition::new(id);
        for node_id in node_ids {
            partition.add_instance(ReplicaState::Online, instance(node_id));
        }
        assignment.add_partition(partition);
    }
    assignment
}

/// A partition status where every given instance reports the same status.
pub fn partition_status_with(
    partition_id: u32,
    node_ids: &[&str],
    status: ExecutionStatus,
    messages_consumed: u64,
) -> PartitionStatus {
    let mut partition_status = PartitionStatus::new(partition_id);
    for node_id in node_ids {
        partition_status.update_replica_status(node_id, status, messages_consumed);
    }
    partition_status
}

/// Delivers a partition status event for every partition of a push.
pub async fn report_replica_status(
    monitor: &Arc<PushMonitor>,
    topic: &str,
    partition_count: u32,
    node_ids: &[&str],
    status: ExecutionStatus,
) {
    for id in 0..partition_count {
        monitor
            .on_partition_status_change(topic, partition_status_with(id, node_ids, status, 100))
            .await
            .unwrap();
    }
}

pub fn store_with_version(name: &str, version_number: i32) -> Store {
    let mut store = Store::new(name);
    store.versions.push(Version::new(name, version_number));
    store
}

pub fn make_hybrid(mut store: Store) -> Store {
    store.hybrid_store_config = Some(HybridStoreConfig {
        rewind_seconds: 86400,
        offset_lag_threshold: 1000,
    });
    store
}
