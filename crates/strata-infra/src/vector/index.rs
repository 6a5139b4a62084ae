//! Per-layer LanceDB vector index.
//!
//! One table per layer holds `(id, owner_id, vector)`. Search is a cosine
//! nearest-neighbour query prefiltered by owner; the caller resolves the
//! returned ids to full records.

use std::collections::HashSet;
use std::sync::Arc;

use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::{DataType, Field};
use futures_util::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use strata_types::error::RepositoryError;
use strata_types::layer::Layer;
use uuid::Uuid;

use super::lance::LanceVectorStore;
use super::schema::layer_vector_schema;

/// A nearest-neighbour hit: record id and cosine similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorHit {
    pub id: Uuid,
    pub score: f32,
}

/// Vector table for a single layer.
pub struct LanceLayerIndex {
    table: lancedb::Table,
    dimension: usize,
    /// `dimension` as the Arrow list width.
    width: i32,
}

impl LanceLayerIndex {
    /// Open the layer's table, creating it on first use.
    pub async fn open(
        store: &LanceVectorStore,
        layer: Layer,
        dimension: usize,
    ) -> Result<Self, RepositoryError> {
        let width = i32::try_from(dimension)
            .map_err(|_| RepositoryError::Query(format!("embedding dimension {dimension} is too large")))?;
        let table = store
            .ensure_table(layer.collection_name(), Arc::new(layer_vector_schema(width)))
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to ensure vector table: {e}")))?;

        Ok(Self {
            table,
            dimension,
            width,
        })
    }

    /// Reject vectors the table cannot hold.
    pub fn check_dimension(&self, vector: &[f32]) -> Result<(), RepositoryError> {
        if vector.len() != self.dimension {
            return Err(RepositoryError::Query(format!(
                "embedding has {} dimensions, expected {}",
                vector.len(),
                self.dimension
            )));
        }
        Ok(())
    }

    /// Index `embedding` under `id`, replacing any previous vector for it.
    pub async fn put(&self, id: &Uuid, owner_id: &str, embedding: &[f32]) -> Result<(), RepositoryError> {
        self.check_dimension(embedding)?;
        let batch = self.build_record_batch(id, owner_id, embedding)?;

        self.table
            .delete(&format!("id = '{id}'"))
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to replace vector: {e}")))?;

        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);
        self.table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to add vector: {e}")))?;

        Ok(())
    }

    /// Up to `limit` ids of `owner_id`'s vectors closest to `query`, best first.
    pub async fn nearest(
        &self,
        owner_id: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorHit>, RepositoryError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(query)?;

        let results = self
            .table
            .vector_search(query)
            .map_err(|e| RepositoryError::Query(format!("Vector search setup failed: {e}")))?
            .distance_type(lancedb::DistanceType::Cosine)
            .only_if(format!("owner_id = {}", sql_literal(owner_id)))
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RepositoryError::Query(format!("Vector search failed: {e}")))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to collect results: {e}")))?;

        let mut hits = Vec::new();
        let mut seen = HashSet::new();
        for batch in &batches {
            for hit in Self::record_batch_to_hits(batch)? {
                // Concurrent replacements of one id can briefly leave two rows.
                if seen.insert(hit.id) {
                    hits.push(hit);
                }
            }
        }
        hits.truncate(limit);
        Ok(hits)
    }

    /// Number of vectors indexed for `owner_id`.
    pub async fn count_by_owner(&self, owner_id: &str) -> Result<u64, RepositoryError> {
        let count = self
            .table
            .count_rows(Some(format!("owner_id = {}", sql_literal(owner_id))))
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to count vectors: {e}")))?;
        Ok(count as u64)
    }

    fn build_record_batch(
        &self,
        id: &Uuid,
        owner_id: &str,
        embedding: &[f32],
    ) -> Result<RecordBatch, RepositoryError> {
        let width = self.width;
        let schema = Arc::new(layer_vector_schema(width));

        let values = Float32Array::from(embedding.to_vec());
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::try_new(field, width, Arc::new(values), None)
            .map_err(|e| RepositoryError::Query(format!("Failed to build vector column: {e}")))?;

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![id.to_string()])),
                Arc::new(StringArray::from(vec![owner_id.to_string()])),
                Arc::new(vector_array),
            ],
        )
        .map_err(|e| RepositoryError::Query(format!("Failed to build record batch: {e}")))
    }

    fn record_batch_to_hits(batch: &RecordBatch) -> Result<Vec<VectorHit>, RepositoryError> {
        if batch.num_rows() == 0 {
            return Ok(Vec::new());
        }

        let id_col = batch
            .column_by_name("id")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| RepositoryError::Query("search result has no id column".to_string()))?;
        // The _distance column is added by LanceDB vector search
        let distance_col = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| RepositoryError::Query("search result has no _distance column".to_string()))?;

        (0..batch.num_rows())
            .map(|i| {
                let id = Uuid::parse_str(id_col.value(i))
                    .map_err(|e| RepositoryError::Query(format!("invalid memory id: {e}")))?;
                Ok(VectorHit {
                    id,
                    score: similarity_from_distance(distance_col.value(i)),
                })
            })
            .collect()
    }
}

/// Cosine similarity in `[-1, 1]` from LanceDB's cosine distance.
///
/// A zero-norm vector has no defined distance; it scores `0.0`.
fn similarity_from_distance(distance: f32) -> f32 {
    if distance.is_nan() {
        return 0.0;
    }
    (1.0 - distance).clamp(-1.0, 1.0)
}

/// Quote `value` as a SQL string literal for a LanceDB filter.
fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
