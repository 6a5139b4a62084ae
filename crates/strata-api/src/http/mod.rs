//! HTTP/REST API layer for strata.
//!
//! Axum-based REST API at `/api/v1/` with envelope response format and CORS.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
