// src/core/errors.rs

//! Defines the primary error type for the control plane.

use thiserror::Error;

/// The main error enum, representing all possible failures within the
/// controller. Using `thiserror` allows for clean error definitions and
/// automatic `From` trait implementations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpalError {
    #[error("Offline push not found for topic: {0}")]
    PushNotFound(String),

    #[error("Push status has already been created for topic: {0} in cluster: {1}")]
    PushAlreadyExists(String, String),

    #[error("Store not found: {0}")]
    StoreNotFound(String),

    #[error("Version {1} not found for store: {0}")]
    VersionNotFound(String, i32),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Accessor error: {0}")]
    Accessor(String),

    #[error("Routing data error: {0}")]
    Routing(String),

    #[error("Replication error: {0}")]
    Replication(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for OpalError {
    fn from(e: serde_json::Error) -> Self {
        OpalError::Internal(format!("JSON serialization/deserialization error: {e}"))
    }
}
