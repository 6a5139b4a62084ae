//! Layer store trait.
//!
//! One instance backs exactly one [`Layer`](strata_types::layer::Layer)
//! collection. Implementations (in-memory, SQLite) live in strata-infra.

use strata_types::error::RepositoryError;
use strata_types::memory::{Fingerprint, MemoryPatch, MemoryRecord, ScoredRecord};
use uuid::Uuid;

/// Storage collection for a single memory layer.
///
/// Implementations must keep `(owner_id, fingerprint)` unique within the
/// collection and return [`RepositoryError::Conflict`] from `insert` when the
/// pair already exists.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait LayerStore: Send + Sync {
    /// Look up the record with this owner and dedup key, if any.
    fn find_by_owner_and_fingerprint(
        &self,
        owner_id: &str,
        fingerprint: Fingerprint,
    ) -> impl std::future::Future<Output = Result<Option<MemoryRecord>, RepositoryError>> + Send;

    /// Insert a new record.
    fn insert(
        &self,
        record: &MemoryRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Overwrite the mutable fields of an existing record.
    ///
    /// Returns [`RepositoryError::NotFound`] if no record has this id.
    fn patch_by_id(
        &self,
        id: &Uuid,
        patch: &MemoryPatch,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Nearest records for `owner_id`, highest score first, at most `limit`.
    fn vector_search(
        &self,
        owner_id: &str,
        query: &[f32],
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<ScoredRecord>, RepositoryError>> + Send;

    /// Number of records held for `owner_id`.
    fn count_by_owner(
        &self,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
