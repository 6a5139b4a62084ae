//! Extraction provider implementations.

pub mod openai_compat;
