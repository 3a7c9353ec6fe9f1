// src/core/mod.rs

//! The central module containing the core logic and data structures of the
//! Opal control plane.

pub mod errors;
pub mod meta;
pub mod metrics;
pub mod pushmonitor;

pub use errors::OpalError;
