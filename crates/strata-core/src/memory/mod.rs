//! The layered memory engine.
//!
//! - [`registry`]: the fixed layer set and one storage handle per layer
//! - [`upsert`]: fingerprint-deduplicated writes into one layer
//! - [`extraction`]: provider output to embedded, upserted records
//! - [`retrieval`]: fan-out similarity search and rank-merge across layers
//! - [`rate_gate`]: per-owner extraction debounce
//! - [`context`]: prompt-ready rendering of retrieved memories

pub mod context;
pub mod extraction;
pub mod fingerprint;
pub mod rate_gate;
pub mod registry;
pub mod retrieval;
pub mod upsert;
