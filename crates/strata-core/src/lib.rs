//! Memory engine logic and port definitions for strata.
//!
//! This crate defines the "ports" (provider, storage and queue traits) that
//! the infrastructure layer implements, and the engine built on top of them.
//! It depends only on `strata-types` -- never on `strata-infra` or any
//! database/IO crate.

pub mod job;
pub mod memory;
pub mod provider;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;
