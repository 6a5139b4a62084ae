//! Vector storage: the LanceDB connection and per-layer vector index used by
//! the persistent backend, and the in-memory layer store.

pub mod index;
pub mod lance;
pub mod memory;
pub mod schema;
