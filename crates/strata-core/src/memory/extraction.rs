//! Extraction orchestrator.
//!
//! Sends a message and its context window to the extraction provider, parses
//! the `{ "items": [...] }` reply, and embeds and upserts each candidate in
//! provider order.
//!
//! Termination paths are distinct:
//! - provider call fails: [`MemoryError::ProviderUnavailable`]
//! - reply is not a JSON object: [`MemoryError::MalformedExtractionResponse`],
//!   nothing written
//! - reply has no (or null) `items`: zero candidates, `Ok`

use std::sync::Arc;

use serde::Deserialize;
use strata_types::config::ItemFailurePolicy;
use strata_types::error::MemoryError;
use strata_types::layer::Layer;
use strata_types::memory::{ExtractionReport, ExtractionRequest, MemoryDraft};
use strata_types::provider::ExtractionPrompt;

use super::registry::LayerRegistry;
use super::upsert::UpsertEngine;
use crate::provider::box_embedder::BoxEmbedder;
use crate::provider::box_extractor::BoxExtractionProvider;

/// Instruction sent with every extraction call.
pub const EXTRACTION_INSTRUCTION: &str = r#"You extract durable, long-term memories about the user from a chat message.

Sort each memory into exactly one layer:
- "identities": who the user is (name, age, job, location, relationships)
- "preferences": likes, dislikes, tastes and habits of choice
- "experiences": things that happened to the user in the past
- "activities": ongoing or recurring things the user does
- "contexts": the user's current situation, plans and constraints
- "personas": personality traits and communication style

Rules:
1. Only extract facts worth remembering across conversations
2. "text" is the statement as the user expressed it
3. "abstract" is a short third-person summary of "text"
4. "tags" are 0-5 short lowercase labels
5. Use the context only to resolve references in the message

Respond with a single JSON object and nothing else:
{"items": [{"layer": "...", "text": "...", "abstract": "...", "tags": ["..."]}]}

If there is nothing worth remembering, respond with {"items": []}"#;

/// One candidate as the provider emits it, before validation.
#[derive(Debug, Deserialize)]
struct RawCandidate {
    layer: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// A candidate that passed validation and names a registered layer.
#[derive(Debug)]
struct Candidate {
    layer: Layer,
    text: String,
    abstract_text: String,
    tags: Vec<String>,
}

/// Turns one message into zero or more upserted memory records.
pub struct ExtractionOrchestrator {
    registry: Arc<LayerRegistry>,
    provider: Arc<BoxExtractionProvider>,
    embedder: Arc<BoxEmbedder>,
    upsert: UpsertEngine,
    item_failure: ItemFailurePolicy,
}

impl ExtractionOrchestrator {
    pub fn new(
        registry: Arc<LayerRegistry>,
        provider: Arc<BoxExtractionProvider>,
        embedder: Arc<BoxEmbedder>,
        item_failure: ItemFailurePolicy,
    ) -> Self {
        Self {
            upsert: UpsertEngine::new(Arc::clone(&registry)),
            registry,
            provider,
            embedder,
            item_failure,
        }
    }

    /// Run one extraction call end to end.
    ///
    /// Under [`ItemFailurePolicy::Abort`] the first embedding or write failure
    /// ends the call with that error; records written before it remain.
    /// Under [`ItemFailurePolicy::Skip`] the failing candidate is counted in
    /// [`ExtractionReport::failed`] and the rest are still processed.
    #[tracing::instrument(
        name = "extract_memories",
        skip(self, request),
        fields(
            owner_id = %request.owner_id,
            chat_id = %request.source_chat_id,
            message_id = %request.source_message_id,
        )
    )]
    pub async fn extract(&self, request: &ExtractionRequest) -> Result<ExtractionReport, MemoryError> {
        let prompt = ExtractionPrompt {
            instruction: EXTRACTION_INSTRUCTION.to_string(),
            message: request.text.clone(),
            context_window: request.context_window.clone(),
        };

        let raw = self
            .provider
            .extract_candidates(&prompt)
            .await
            .map_err(|e| MemoryError::from_provider(self.provider.name(), e))?;

        let items = parse_items(&raw)?;
        let mut report = ExtractionReport::default();

        for item in items {
            let Some(candidate) = self.validate(item) else {
                report.skipped += 1;
                continue;
            };

            match self.write_candidate(request, candidate).await {
                Ok(outcome) if outcome.is_inserted() => report.inserted += 1,
                Ok(_) => report.updated += 1,
                Err(e) => match self.item_failure {
                    ItemFailurePolicy::Abort => {
                        tracing::warn!(
                            error = %e,
                            written = report.written(),
                            "Extraction aborted by failing candidate"
                        );
                        return Err(e);
                    }
                    ItemFailurePolicy::Skip => {
                        tracing::warn!(error = %e, "Candidate failed; continuing");
                        report.failed += 1;
                    }
                },
            }
        }

        tracing::info!(
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            "Extraction complete"
        );
        Ok(report)
    }

    /// Drop candidates that are malformed, empty, or name an unknown layer.
    fn validate(&self, item: serde_json::Value) -> Option<Candidate> {
        let raw: RawCandidate = match serde_json::from_value(item) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping candidate with unexpected shape");
                return None;
            }
        };

        let Some(layer) = self.registry.resolve(&raw.layer) else {
            tracing::warn!(layer = %raw.layer, "Skipping candidate for unknown layer");
            return None;
        };

        let text = raw.text.unwrap_or_default().trim().to_string();
        let abstract_text = raw.abstract_text.unwrap_or_default().trim().to_string();
        if text.is_empty() && abstract_text.is_empty() {
            tracing::warn!(layer = %layer, "Skipping empty candidate");
            return None;
        }

        Some(Candidate {
            layer,
            text,
            abstract_text,
            tags: raw.tags.unwrap_or_default(),
        })
    }

    async fn write_candidate(
        &self,
        request: &ExtractionRequest,
        candidate: Candidate,
    ) -> Result<strata_types::memory::UpsertOutcome, MemoryError> {
        let embed_source = if candidate.text.is_empty() {
            &candidate.abstract_text
        } else {
            &candidate.text
        };
        let embedding = self
            .embedder
            .embed_one(embed_source)
            .await
            .map_err(|e| MemoryError::from_provider(self.embedder.model_name(), e))?;

        let text = if candidate.text.is_empty() {
            candidate.abstract_text.clone()
        } else {
            candidate.text
        };

        self.upsert
            .upsert(MemoryDraft {
                layer: candidate.layer,
                owner_id: request.owner_id.clone(),
                source_chat_id: request.source_chat_id.clone(),
                source_message_id: request.source_message_id.clone(),
                text,
                abstract_text: candidate.abstract_text,
                tags: candidate.tags,
                embedding,
            })
            .await
    }
}

/// Parse the provider's reply into its raw candidate list.
fn parse_items(raw: &str) -> Result<Vec<serde_json::Value>, MemoryError> {
    let body = strip_code_fence(raw);
    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        tracing::warn!(
            error = %e,
            content_preview = %body.chars().take(200).collect::<String>(),
            "Extraction reply is not JSON"
        );
        MemoryError::MalformedExtractionResponse(e.to_string())
    })?;

    let serde_json::Value::Object(mut object) = value else {
        return Err(MemoryError::MalformedExtractionResponse(
            "expected a JSON object".to_string(),
        ));
    };

    match object.remove("items") {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => Ok(items),
        Some(_) => Err(MemoryError::MalformedExtractionResponse(
            "\"items\" is not an array".to_string(),
        )),
    }
}

/// Models often wrap JSON in a markdown fence; accept that.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
