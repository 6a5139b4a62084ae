//! Infrastructure layer for strata.
//!
//! Contains implementations of the ports defined in `strata-core`: SQLite and
//! in-memory layer stores, the OpenAI-compatible embedding and extraction
//! providers, configuration loading and credential resolution.

pub mod config;
pub mod embedding;
pub mod llm;
pub mod providers;
pub mod registry;
pub mod secret;
pub mod sqlite;
pub mod vector;
