//! Arrow schema for the per-layer LanceDB vector tables.
//!
//! Arrow versions MUST match lancedb's transitive dependency (57.3 for lancedb 0.26).

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

/// Schema of a layer's vector table (`memory_<layer>`).
///
/// Only what nearest-neighbour search needs lives here: the record id, the
/// owner used for filtering, and the embedding. The record itself is kept in
/// SQLite under the same id.
pub fn layer_vector_schema(dimension: i32) -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("owner_id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension,
            ),
            false,
        ),
    ])
}
