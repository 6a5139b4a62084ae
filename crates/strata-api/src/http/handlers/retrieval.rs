//! Retrieval handler.
//!
//! POST /api/v1/retrievals - Ranked memories plus the rendered context block.
//! POST /api/v1/context    - Only the context block; never fails on engine errors.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};

use strata_types::memory::{RetrievalQuery, RetrievedMemory};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RetrievalRequest {
    pub owner_id: String,
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct RetrievalResponse {
    pub items: Vec<RetrievedMemory>,
    /// Formatted, length-capped block for prompt injection; empty when no items.
    pub context: String,
}

#[derive(Debug, Serialize)]
pub struct ContextResponse {
    pub context: String,
}

/// POST /api/v1/retrievals
pub async fn retrieve(
    State(state): State<AppState>,
    payload: Result<Json<RetrievalRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<RetrievalResponse>>, AppError> {
    let start = Instant::now();
    let Json(body) = payload?;

    let query = RetrievalQuery {
        owner_id: body.owner_id,
        text: body.query,
    };
    let items = state.memory_service.retrieve(&query).await?;
    let context = state.memory_service.format_context(&items);

    Ok(Json(ApiResponse::success(RetrievalResponse { items, context }, start)))
}

/// POST /api/v1/context
///
/// For prompt enrichment: a failed recall answers with an empty block so the
/// caller proceeds without memory.
pub async fn context(
    State(state): State<AppState>,
    payload: Result<Json<RetrievalRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ContextResponse>>, AppError> {
    let start = Instant::now();
    let Json(body) = payload?;

    let query = RetrievalQuery {
        owner_id: body.owner_id,
        text: body.query,
    };
    let context = state.memory_service.recall_context(&query).await;

    Ok(Json(ApiResponse::success(ContextResponse { context }, start)))
}
