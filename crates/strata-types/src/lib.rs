//! Shared domain types for strata.
//!
//! This crate contains the domain types used across the memory engine:
//! layers, memory records, extraction and retrieval payloads, configuration,
//! and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod layer;
pub mod memory;
pub mod provider;
