//! Memory types for strata.
//!
//! These types model an owner's layered long-term memory: the persisted
//! [`MemoryRecord`], the arguments and outcome of an upsert, and the
//! ephemeral extraction and retrieval payloads.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::layer::Layer;

/// Deterministic, non-cryptographic dedup key for one owner within one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub u32);

impl Fingerprint {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// A persisted memory item in one layer collection.
///
/// `(owner_id, fingerprint)` is unique within a layer collection. A second
/// sighting of the same pair mutates this record instead of creating another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub layer: Layer,
    pub owner_id: String,
    /// Provenance only; never part of the dedup key.
    pub source_chat_id: String,
    pub source_message_id: String,
    /// Verbatim extracted statement.
    pub text: String,
    /// Short normalized summary of `text`, preferred for display.
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub tags: BTreeSet<String>,
    pub embedding: Vec<f32>,
    pub fingerprint: Fingerprint,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Text to show to a reader: the abstract when present, else the statement.
    pub fn display_text(&self) -> &str {
        if self.abstract_text.trim().is_empty() {
            &self.text
        } else {
            &self.abstract_text
        }
    }

    /// Apply the mutable fields of a later sighting.
    pub fn apply_patch(&mut self, patch: MemoryPatch) {
        self.text = patch.text;
        self.abstract_text = patch.abstract_text;
        self.tags = patch.tags;
        self.embedding = patch.embedding;
        self.updated_at = patch.updated_at;
    }
}

/// The fields a later sighting of an existing fingerprint overwrites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPatch {
    pub text: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub tags: BTreeSet<String>,
    pub embedding: Vec<f32>,
    pub updated_at: DateTime<Utc>,
}

/// Arguments to a single upsert into one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryDraft {
    pub layer: Layer,
    pub owner_id: String,
    pub source_chat_id: String,
    pub source_message_id: String,
    pub text: String,
    pub abstract_text: String,
    pub tags: Vec<String>,
    pub embedding: Vec<f32>,
}

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "id", rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted(Uuid),
    Updated(Uuid),
}

impl UpsertOutcome {
    /// Id of the record that was written.
    pub fn id(&self) -> Uuid {
        match self {
            UpsertOutcome::Inserted(id) | UpsertOutcome::Updated(id) => *id,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted(_))
    }
}

/// A record returned by a similarity search, with its score (higher is closer).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    pub score: f32,
}

/// One extraction call's input. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub owner_id: String,
    pub source_chat_id: String,
    pub source_message_id: String,
    /// Raw message text.
    pub text: String,
    /// Bounded excerpt of recent conversation history.
    #[serde(default)]
    pub context_window: String,
}

impl ExtractionRequest {
    /// Owner of a message: the sender when known, otherwise the chat.
    pub fn resolve_owner(sender_id: Option<&str>, chat_id: &str) -> String {
        match sender_id.map(str::trim) {
            Some(sender) if !sender.is_empty() => sender.to_string(),
            _ => chat_id.trim().to_string(),
        }
    }
}

/// Counts produced by one extraction call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// Candidates written as new records.
    pub inserted: usize,
    /// Candidates that refreshed an existing record.
    pub updated: usize,
    /// Candidates dropped before any write (unknown layer, empty content).
    pub skipped: usize,
    /// Candidates whose embedding or write failed (only under the skip policy).
    pub failed: usize,
}

impl ExtractionReport {
    /// Accepted and written candidates.
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// A retrieval request. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalQuery {
    pub owner_id: String,
    /// Free-text query.
    pub text: String,
}

/// One ranked, layer-tagged retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedMemory {
    pub layer: Layer,
    pub text: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub tags: Vec<String>,
    pub score: f32,
}

impl RetrievedMemory {
    /// Build a result from a scored search hit in `layer`.
    pub fn from_scored(layer: Layer, scored: ScoredRecord) -> Self {
        let ScoredRecord { record, score } = scored;
        Self {
            layer,
            text: record.text,
            abstract_text: record.abstract_text,
            tags: record.tags.into_iter().collect(),
            score,
        }
    }

    /// The abstract when present, else the statement.
    pub fn display_text(&self) -> &str {
        if self.abstract_text.trim().is_empty() {
            &self.text
        } else {
            &self.abstract_text
        }
    }
}

/// Boundary payload for "submit extraction request".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitExtraction {
    /// Sender identity; the chat id is used when absent.
    #[serde(default)]
    pub owner_id: Option<String>,
    pub chat_id: String,
    pub message_id: String,
    pub text: String,
    #[serde(default)]
    pub context: String,
}

/// Acknowledgement of a submitted extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SubmitOutcome {
    /// The job was handed to the queue; its outcome is not observable here.
    Enqueued { job_id: Uuid },
    /// The rate gate denied the trigger for this owner.
    Throttled,
}

/// A queued extraction, as carried by the job queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionJob {
    pub id: Uuid,
    pub request: ExtractionRequest,
    /// 1-based attempt number of the next execution.
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl ExtractionJob {
    pub fn new(request: ExtractionRequest) -> Self {
        Self {
            id: Uuid::now_v7(),
            request,
            attempt: 1,
            enqueued_at: Utc::now(),
        }
    }
}
