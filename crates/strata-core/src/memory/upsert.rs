//! Upsert engine: the sole write path into a layer collection.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use strata_types::error::{MemoryError, RepositoryError};
use strata_types::memory::{MemoryDraft, MemoryPatch, MemoryRecord, UpsertOutcome};
use uuid::Uuid;

use super::fingerprint::fingerprint;
use super::registry::LayerRegistry;

/// Writes one memory item into one layer, deduplicated by fingerprint.
#[derive(Clone)]
pub struct UpsertEngine {
    registry: Arc<LayerRegistry>,
}

impl UpsertEngine {
    pub fn new(registry: Arc<LayerRegistry>) -> Self {
        Self { registry }
    }

    /// Insert the draft, or refresh the record already holding its fingerprint.
    ///
    /// The fingerprint is taken over `text`, or over `abstract` when `text`
    /// is blank. Calling this twice with identical arguments leaves one
    /// record and reports [`UpsertOutcome::Updated`] the second time.
    ///
    /// Two concurrent first sightings of the same fingerprint race: the loser
    /// of the insert patches the winner's record instead, so both succeed and
    /// the last write wins.
    #[tracing::instrument(
        name = "upsert_memory",
        skip(self, draft),
        fields(layer = %draft.layer, owner_id = %draft.owner_id)
    )]
    pub async fn upsert(&self, draft: MemoryDraft) -> Result<UpsertOutcome, MemoryError> {
        let store = self.registry.get(draft.layer);
        let key_text = if draft.text.trim().is_empty() {
            &draft.abstract_text
        } else {
            &draft.text
        };
        let fp = fingerprint(draft.layer, key_text);
        let now = Utc::now();
        let tags = normalize_tags(&draft.tags);

        if let Some(existing) = store.find_by_owner_and_fingerprint(&draft.owner_id, fp).await? {
            let patch = MemoryPatch {
                text: draft.text,
                abstract_text: draft.abstract_text,
                tags,
                embedding: draft.embedding,
                updated_at: now,
            };
            store.patch_by_id(&existing.id, &patch).await?;
            tracing::debug!(fingerprint = %fp, id = %existing.id, "Memory updated");
            return Ok(UpsertOutcome::Updated(existing.id));
        }

        let record = MemoryRecord {
            id: Uuid::now_v7(),
            layer: draft.layer,
            owner_id: draft.owner_id,
            source_chat_id: draft.source_chat_id,
            source_message_id: draft.source_message_id,
            text: draft.text,
            abstract_text: draft.abstract_text,
            tags,
            embedding: draft.embedding,
            fingerprint: fp,
            created_at: now,
            updated_at: now,
        };

        match store.insert(&record).await {
            Ok(()) => {
                tracing::debug!(fingerprint = %fp, id = %record.id, "Memory inserted");
                Ok(UpsertOutcome::Inserted(record.id))
            }
            Err(RepositoryError::Conflict(_)) => {
                let existing = store
                    .find_by_owner_and_fingerprint(&record.owner_id, fp)
                    .await?
                    .ok_or(RepositoryError::NotFound)?;
                let patch = MemoryPatch {
                    text: record.text,
                    abstract_text: record.abstract_text,
                    tags: record.tags,
                    embedding: record.embedding,
                    updated_at: now,
                };
                store.patch_by_id(&existing.id, &patch).await?;
                tracing::debug!(fingerprint = %fp, id = %existing.id, "Lost insert race; memory updated");
                Ok(UpsertOutcome::Updated(existing.id))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Trim tags and drop empty ones. Tags are an unordered set.
fn normalize_tags(tags: &[String]) -> BTreeSet<String> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{draft, mock_registry};
    use strata_types::layer::Layer;

    #[tokio::test]
    async fn test_first_upsert_inserts() {
        let (registry, stores) = mock_registry();
        let engine = UpsertEngine::new(registry);

        let outcome = engine
            .upsert(draft(Layer::Identities, "u1", "Loves coffee"))
            .await
            .unwrap();

        assert!(outcome.is_inserted());
        assert_eq!(stores[Layer::Identities.index()].len(), 1);
    }

    #[tokio::test]
    async fn test_second_identical_upsert_updates_same_record() {
        let (registry, stores) = mock_registry();
        let engine = UpsertEngine::new(registry);

        let first = engine
            .upsert(draft(Layer::Identities, "u1", "Loves coffee"))
            .await
            .unwrap();
        let second = engine
            .upsert(draft(Layer::Identities, "u1", "Loves coffee"))
            .await
            .unwrap();

        assert_eq!(second, UpsertOutcome::Updated(first.id()));
        assert_eq!(stores[Layer::Identities.index()].len(), 1);
    }

    #[tokio::test]
    async fn test_case_and_whitespace_variants_dedup() {
        let (registry, stores) = mock_registry();
        let engine = UpsertEngine::new(registry);

        engine
            .upsert(draft(Layer::Identities, "u1", "Loves Coffee"))
            .await
            .unwrap();
        let outcome = engine
            .upsert(draft(Layer::Identities, "u1", "  loves coffee  "))
            .await
            .unwrap();

        assert!(!outcome.is_inserted());
        let records = stores[Layer::Identities.index()].records();
        assert_eq!(records.len(), 1);
        // The later sighting's text wins.
        assert_eq!(records[0].text, "  loves coffee  ");
    }

    #[tokio::test]
    async fn test_same_text_in_two_layers_stays_separate() {
        let (registry, stores) = mock_registry();
        let engine = UpsertEngine::new(registry);

        let a = engine
            .upsert(draft(Layer::Identities, "u1", "Loves coffee"))
            .await
            .unwrap();
        let b = engine
            .upsert(draft(Layer::Preferences, "u1", "Loves coffee"))
            .await
            .unwrap();

        assert!(a.is_inserted());
        assert!(b.is_inserted());
        assert_ne!(a.id(), b.id());
        assert_eq!(stores[Layer::Identities.index()].len(), 1);
        assert_eq!(stores[Layer::Preferences.index()].len(), 1);
    }

    #[tokio::test]
    async fn test_owners_do_not_share_records() {
        let (registry, stores) = mock_registry();
        let engine = UpsertEngine::new(registry);

        engine.upsert(draft(Layer::Contexts, "u1", "On vacation")).await.unwrap();
        let outcome = engine.upsert(draft(Layer::Contexts, "u2", "On vacation")).await.unwrap();

        assert!(outcome.is_inserted());
        assert_eq!(stores[Layer::Contexts.index()].len(), 2);
    }

    #[tokio::test]
    async fn test_update_refreshes_mutable_fields_only() {
        let (registry, stores) = mock_registry();
        let engine = UpsertEngine::new(registry);

        engine.upsert(draft(Layer::Personas, "u1", "Night owl")).await.unwrap();
        let before = stores[Layer::Personas.index()].records().remove(0);

        let mut later = draft(Layer::Personas, "u1", "night owl");
        later.abstract_text = "Works late".to_string();
        later.tags = vec![" sleep ".to_string(), "".to_string()];
        later.source_message_id = "m-other".to_string();
        engine.upsert(later).await.unwrap();

        let after = stores[Layer::Personas.index()].records().remove(0);
        assert_eq!(after.id, before.id);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.source_message_id, before.source_message_id);
        assert_eq!(after.abstract_text, "Works late");
        assert_eq!(after.tags.iter().collect::<Vec<_>>(), vec!["sleep"]);
        assert!(after.updated_at >= before.updated_at);
    }

    #[tokio::test]
    async fn test_blank_text_keys_on_abstract() {
        let (registry, stores) = mock_registry();
        let engine = UpsertEngine::new(registry);

        let mut d = draft(Layer::Experiences, "u1", "");
        d.abstract_text = "Climbed Kilimanjaro".to_string();
        engine.upsert(d.clone()).await.unwrap();
        let outcome = engine.upsert(d).await.unwrap();

        assert!(!outcome.is_inserted());
        assert_eq!(stores[Layer::Experiences.index()].len(), 1);
    }

    #[tokio::test]
    async fn test_insert_conflict_becomes_update() {
        let (registry, stores) = mock_registry();
        let engine = UpsertEngine::new(registry);
        let store = &stores[Layer::Activities.index()];

        engine.upsert(draft(Layer::Activities, "u1", "Plays chess")).await.unwrap();
        // Hide the record from the first lookup to simulate a concurrent insert.
        store.miss_next_lookup();
        let outcome = engine
            .upsert(draft(Layer::Activities, "u1", "Plays chess"))
            .await
            .unwrap();

        assert!(!outcome.is_inserted());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces() {
        let (registry, stores) = mock_registry();
        let engine = UpsertEngine::new(registry);
        stores[Layer::Identities.index()].fail_writes();

        let err = engine
            .upsert(draft(Layer::Identities, "u1", "Loves coffee"))
            .await
            .unwrap_err();

        assert!(matches!(err, MemoryError::Storage(_)));
    }
}
