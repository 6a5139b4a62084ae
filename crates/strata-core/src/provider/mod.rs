//! Provider ports: the embedding model and the extraction (chat-completion)
//! model. Implementations live in strata-infra.

pub mod box_embedder;
pub mod box_extractor;
pub mod embedder;
pub mod extractor;
