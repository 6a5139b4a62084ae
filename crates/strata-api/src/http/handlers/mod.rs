//! HTTP request handlers for the REST API.

pub mod extraction;
pub mod health;
pub mod retrieval;
