// src/core/meta/store.rs

//! Store and version metadata, plus the repository and cleanup interfaces the
//! push monitor drives when a push reaches a terminal state.

use crate::core::OpalError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Name prefix of the shared metadata system store. Its versions are managed
/// by the platform itself, so the monitor never mutates them on push failure.
pub const METADATA_SYSTEM_STORE_PREFIX: &str = "opal_system_store_metadata";

/// Returns whether a store name denotes the shared metadata system store.
pub fn is_metadata_system_store(store_name: &str) -> bool {
    store_name.starts_with(METADATA_SYSTEM_STORE_PREFIX)
}

/// Lifecycle status of one store version in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionStatus {
    NotCreated,
    Started,
    /// The push finished but the store has writes disabled, so the version is
    /// parked instead of being brought online.
    Pushed,
    Online,
    Error,
    Killed,
}

/// One version of a store's dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub store_name: String,
    pub number: i32,
    pub status: VersionStatus,
}

impl Version {
    pub fn new(store_name: impl Into<String>, number: i32) -> Self {
        Self {
            store_name: store_name.into(),
            number,
            status: VersionStatus::Started,
        }
    }
}

/// Ingestion configuration that marks a store as hybrid: after the bulk push
/// completes, the version keeps consuming from the store's real-time topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridStoreConfig {
    /// How far back in the real-time topic the buffer replay rewinds.
    pub rewind_seconds: u64,
    /// Offset lag under which a replaying replica is considered caught up.
    pub offset_lag_threshold: u64,
}

/// A store in the catalog together with its version list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub name: String,
    pub current_version: i32,
    pub versions: Vec<Version>,
    pub enable_writes: bool,
    pub hybrid_store_config: Option<HybridStoreConfig>,
    /// When enabled, catalog changes are mirrored into the metadata system
    /// store for router consumption.
    pub store_metadata_system_store_enabled: bool,
}

impl Store {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current_version: 0,
            versions: Vec::new(),
            enable_writes: true,
            hybrid_store_config: None,
            store_metadata_system_store_enabled: false,
        }
    }

    pub fn is_hybrid(&self) -> bool {
        self.hybrid_store_config.is_some()
    }

    pub fn version(&self, number: i32) -> Option<&Version> {
        self.versions.iter().find(|v| v.number == number)
    }

    /// Sets the status of one version. Fails with `VersionNotFound` when the
    /// version is absent from the catalog.
    pub fn update_version_status(
        &mut self,
        number: i32,
        status: VersionStatus,
    ) -> Result<(), OpalError> {
        match self.versions.iter_mut().find(|v| v.number == number) {
            Some(version) => {
                version.status = status;
                Ok(())
            }
            None => Err(OpalError::VersionNotFound(self.name.clone(), number)),
        }
    }
}

/// Read/write access to the store catalog.
///
/// Implementations own their internal synchronization. The monitor always
/// acquires its own lock before calling in here, so implementations must not
/// call back into the monitor while holding their lock.
#[async_trait]
pub trait ReadWriteStoreRepository: Send + Sync {
    /// Looks up a store by name. `None` when the store is unknown.
    async fn get_store(&self, store_name: &str) -> Option<Store>;

    /// Persists an updated store back to the catalog.
    async fn update_store(&self, store: &Store) -> Result<(), OpalError>;

    /// Re-reads the whole catalog from durable storage. Expensive; only used
    /// when a store lookup unexpectedly misses.
    async fn refresh(&self);
}

/// Deletes versions and their topics once pushes settle.
#[async_trait]
pub trait StoreCleaner: Send + Sync {
    async fn topic_cleanup_when_push_complete(
        &self,
        cluster_name: &str,
        store_name: &str,
        version_number: i32,
    ) -> Result<(), OpalError>;

    async fn retire_old_store_versions(
        &self,
        cluster_name: &str,
        store_name: &str,
        delete_backup_versions: bool,
    ) -> Result<(), OpalError>;

    async fn delete_one_store_version(
        &self,
        cluster_name: &str,
        store_name: &str,
        version_number: i32,
    ) -> Result<(), OpalError>;
}

/// Mirrors current-version state into the metadata system store when a store
/// has that mirroring enabled.
#[async_trait]
pub trait SystemStoreWriter: Send + Sync {
    async fn write_current_version_states(
        &self,
        cluster_name: &str,
        store_name: &str,
        versions: &[Version],
        current_version: i32,
    ) -> Result<(), OpalError>;
}
