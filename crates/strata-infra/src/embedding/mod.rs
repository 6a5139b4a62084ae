//! Embedding provider implementations.

pub mod openai;
