//! Configuration types for strata.
//!
//! `StrataConfig` represents the top-level `strata.toml`. Every field has a
//! serde default so a partial (or empty) file is always valid.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the memory engine and its adapters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrataConfig {
    #[serde(default)]
    pub memory: MemorySettings,
    #[serde(default)]
    pub rate_gate: RateGateSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub extraction: ExtractionSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub worker: WorkerSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

/// What to do when embedding or writing one extracted candidate fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemFailurePolicy {
    /// Abort the whole extraction call; earlier writes are kept.
    #[default]
    Abort,
    /// Log, count the candidate as failed, and continue with the rest.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Nearest matches fetched from each layer per retrieval.
    #[serde(default = "default_per_layer_limit")]
    pub per_layer_limit: usize,
    /// Hard cap on the formatted context block, in characters.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    /// Cap on the history excerpt passed to the extraction provider, in characters.
    #[serde(default = "default_max_context_window_chars")]
    pub max_context_window_chars: usize,
    #[serde(default)]
    pub item_failure: ItemFailurePolicy,
}

fn default_per_layer_limit() -> usize {
    3
}

fn default_max_context_chars() -> usize {
    2000
}

fn default_max_context_window_chars() -> usize {
    4000
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            per_layer_limit: default_per_layer_limit(),
            max_context_chars: default_max_context_chars(),
            max_context_window_chars: default_max_context_window_chars(),
            item_failure: ItemFailurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateGateSettings {
    /// Minimum seconds between allowed extraction triggers per owner.
    /// Zero or negative disables gating.
    #[serde(default)]
    pub min_interval_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimension() -> usize {
    1536
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            api_key_env: default_api_key_env(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_extraction_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
}

fn default_extraction_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_extraction_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
        }
    }
}

/// Which layer store implementation backs the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    /// SQLite file, relative to the data directory unless absolute.
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// LanceDB directory holding the per-layer vector tables, relative to
    /// the data directory unless absolute.
    #[serde(default = "default_vector_path")]
    pub vector_path: String,
}

fn default_storage_path() -> String {
    "strata.db".to_string()
}

fn default_vector_path() -> String {
    "vectors".to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
            vector_path: default_vector_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSettings {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Total executions per job, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_queue_capacity() -> usize {
    256
}

fn default_concurrency() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7410
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
