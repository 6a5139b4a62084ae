//! OpenAI-compatible embeddings client.
//!
//! `POST {base_url}/embeddings` with bearer auth. Works against OpenAI and
//! any server exposing the same endpoint.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strata_core::provider::embedder::Embedder;
use strata_types::config::EmbeddingSettings;
use strata_types::error::MemoryError;
use strata_types::provider::ProviderError;

/// Embedding provider backed by an OpenAI-compatible `/embeddings` endpoint.
///
/// The API key is only exposed when building the request header. This type
/// does not derive Debug.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl OpenAiEmbedder {
    pub fn new(settings: &EmbeddingSettings, api_key: SecretString) -> Result<Self, MemoryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| MemoryError::Configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            dimension: settings.dimension,
        })
    }

    fn url(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }
}

impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(self.url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 => ProviderError::AuthenticationFailed,
                429 => ProviderError::RateLimited {
                    retry_after_ms: None,
                },
                code => ProviderError::Status {
                    status: code,
                    message: error_body,
                },
            });
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            ProviderError::Deserialization(format!("failed to parse response: {e}"))
        })?;

        if parsed.data.len() != texts.len() {
            return Err(ProviderError::Deserialization(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);

        parsed
            .data
            .into_iter()
            .map(|d| {
                if d.embedding.len() == self.dimension {
                    Ok(d.embedding)
                } else {
                    Err(ProviderError::Deserialization(format!(
                        "expected dimension {}, got {}",
                        self.dimension,
                        d.embedding.len()
                    )))
                }
            })
            .collect()
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
