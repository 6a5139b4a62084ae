//! Storage ports: one collection per memory layer.

pub mod box_layer_store;
pub mod layer_store;
