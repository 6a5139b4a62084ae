//! Persistent layer store.
//!
//! Implements `LayerStore` from `strata-core` over one `memory_<layer>`
//! SQLite table, which is the record of truth and enforces the
//! `(owner_id, fingerprint)` uniqueness. Every embedding is also indexed in
//! the layer's LanceDB table, which answers `vector_search`. Embeddings are
//! kept in SQLite as little-endian `f32` blobs; tags are a JSON array.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use sqlx::Row;
use strata_core::store::layer_store::LayerStore;
use strata_types::error::RepositoryError;
use strata_types::layer::Layer;
use strata_types::memory::{Fingerprint, MemoryPatch, MemoryRecord, ScoredRecord};
use uuid::Uuid;

use super::pool::DatabasePool;
use crate::vector::index::LanceLayerIndex;

/// SQLite records plus a LanceDB vector index for a single layer.
pub struct SqliteLayerStore {
    pool: DatabasePool,
    layer: Layer,
    index: LanceLayerIndex,
}

impl SqliteLayerStore {
    pub fn new(pool: DatabasePool, layer: Layer, index: LanceLayerIndex) -> Self {
        Self { pool, layer, index }
    }

    fn table(&self) -> &'static str {
        self.layer.collection_name()
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, MemoryRecord>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT * FROM {} WHERE id IN ({placeholders})", self.table());
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.to_string());
        }
        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut records = HashMap::with_capacity(rows.len());
        for row in &rows {
            let memory_row =
                MemoryRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            let record = memory_row.into_record(self.layer)?;
            records.insert(record.id, record);
        }
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Private Row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct MemoryRow {
    id: String,
    owner_id: String,
    source_chat_id: String,
    source_message_id: String,
    text: String,
    abstract_text: String,
    tags: String,
    embedding: Vec<u8>,
    fingerprint: i64,
    created_at: String,
    updated_at: String,
}

impl MemoryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            source_chat_id: row.try_get("source_chat_id")?,
            source_message_id: row.try_get("source_message_id")?,
            text: row.try_get("text")?,
            abstract_text: row.try_get("abstract")?,
            tags: row.try_get("tags")?,
            embedding: row.try_get("embedding")?,
            fingerprint: row.try_get("fingerprint")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_record(self, layer: Layer) -> Result<MemoryRecord, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid memory id: {e}")))?;
        let tags: BTreeSet<String> = serde_json::from_str(&self.tags)
            .map_err(|e| RepositoryError::Query(format!("invalid tags: {e}")))?;
        let fingerprint = u32::try_from(self.fingerprint)
            .map_err(|e| RepositoryError::Query(format!("invalid fingerprint: {e}")))?;

        Ok(MemoryRecord {
            id,
            layer,
            owner_id: self.owner_id,
            source_chat_id: self.source_chat_id,
            source_message_id: self.source_message_id,
            text: self.text,
            abstract_text: self.abstract_text,
            tags,
            embedding: decode_embedding(&self.embedding)?,
            fingerprint: Fingerprint(fingerprint),
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>, RepositoryError> {
    if bytes.len() % 4 != 0 {
        return Err(RepositoryError::Query(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn encode_tags(tags: &BTreeSet<String>) -> Result<String, RepositoryError> {
    serde_json::to_string(tags).map_err(|e| RepositoryError::Query(format!("invalid tags: {e}")))
}

// ---------------------------------------------------------------------------
// LayerStore implementation
// ---------------------------------------------------------------------------

impl LayerStore for SqliteLayerStore {
    async fn find_by_owner_and_fingerprint(
        &self,
        owner_id: &str,
        fingerprint: Fingerprint,
    ) -> Result<Option<MemoryRecord>, RepositoryError> {
        let sql = format!(
            "SELECT * FROM {} WHERE owner_id = ? AND fingerprint = ?",
            self.table()
        );
        let row = sqlx::query(&sql)
            .bind(owner_id)
            .bind(i64::from(fingerprint.value()))
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let memory_row =
                    MemoryRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(memory_row.into_record(self.layer)?))
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, record: &MemoryRecord) -> Result<(), RepositoryError> {
        self.index.check_dimension(&record.embedding)?;
        let sql = format!(
            r#"INSERT INTO {} (id, owner_id, source_chat_id, source_message_id, text, abstract, tags, embedding, fingerprint, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            self.table()
        );
        let result = sqlx::query(&sql)
            .bind(record.id.to_string())
            .bind(&record.owner_id)
            .bind(&record.source_chat_id)
            .bind(&record.source_message_id)
            .bind(&record.text)
            .bind(&record.abstract_text)
            .bind(encode_tags(&record.tags)?)
            .bind(encode_embedding(&record.embedding))
            .bind(i64::from(record.fingerprint.value()))
            .bind(format_datetime(&record.created_at))
            .bind(format_datetime(&record.updated_at))
            .execute(&self.pool.writer)
            .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                return Err(RepositoryError::Conflict(format!(
                    "owner '{}' already has fingerprint {} in {}",
                    record.owner_id,
                    record.fingerprint,
                    self.table()
                )));
            }
            Err(e) => return Err(RepositoryError::Query(e.to_string())),
        }

        // A failed index write leaves the row unsearchable until the next
        // upsert of the same fingerprint patches and re-indexes it.
        self.index
            .put(&record.id, &record.owner_id, &record.embedding)
            .await
    }

    async fn patch_by_id(&self, id: &Uuid, patch: &MemoryPatch) -> Result<(), RepositoryError> {
        self.index.check_dimension(&patch.embedding)?;
        let sql = format!(
            "UPDATE {} SET text = ?, abstract = ?, tags = ?, embedding = ?, updated_at = ? WHERE id = ? RETURNING owner_id",
            self.table()
        );
        let owner: Option<(String,)> = sqlx::query_as(&sql)
            .bind(&patch.text)
            .bind(&patch.abstract_text)
            .bind(encode_tags(&patch.tags)?)
            .bind(encode_embedding(&patch.embedding))
            .bind(format_datetime(&patch.updated_at))
            .bind(id.to_string())
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some((owner_id,)) = owner else {
            return Err(RepositoryError::NotFound);
        };

        self.index.put(id, &owner_id, &patch.embedding).await
    }

    async fn vector_search(
        &self,
        owner_id: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, RepositoryError> {
        let hits = self.index.nearest(owner_id, query, limit).await?;
        let ids: Vec<Uuid> = hits.iter().map(|hit| hit.id).collect();
        let mut records = self.find_by_ids(&ids).await?;

        let mut scored = Vec::with_capacity(hits.len());
        for hit in hits {
            match records.remove(&hit.id) {
                Some(record) => scored.push(ScoredRecord {
                    record,
                    score: hit.score,
                }),
                None => tracing::warn!(
                    id = %hit.id,
                    table = self.table(),
                    "indexed vector has no stored record"
                ),
            }
        }
        Ok(scored)
    }

    async fn count_by_owner(&self, owner_id: &str) -> Result<u64, RepositoryError> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE owner_id = ?", self.table());
        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(owner_id)
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        u64::try_from(count).map_err(|e| RepositoryError::Query(format!("invalid row count: {e}")))
    }
}
