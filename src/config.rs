// src/config.rs

//! Configuration for the push monitor: retention cap and hybrid-store
//! buffer-replay behavior.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// How many ERROR pushes to keep per store for debugging before retention
    /// starts deleting the oldest ones.
    #[serde(default = "default_max_error_pushes_to_keep")]
    pub max_error_pushes_to_keep: usize,

    /// When true, hybrid-store pushes transition to END_OF_PUSH_RECEIVED
    /// without kicking off buffer replay through the topic replicator.
    #[serde(default)]
    pub skip_buffer_replay_for_hybrid: bool,
}

fn default_max_error_pushes_to_keep() -> usize {
    5
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_error_pushes_to_keep: default_max_error_pushes_to_keep(),
            skip_buffer_replay_for_hybrid: false,
        }
    }
}

impl MonitorConfig {
    pub async fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: MonitorConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
