//! SQLite storage layer.
//!
//! One table per memory layer, backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod layer_store;
pub mod pool;
