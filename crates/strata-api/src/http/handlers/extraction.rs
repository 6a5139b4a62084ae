//! Extraction submission handler.
//!
//! POST /api/v1/extractions - Queue a message for background memory extraction.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;

use strata_types::memory::{SubmitExtraction, SubmitOutcome};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/extractions
///
/// 202 with the job id when queued, 200 with `status: "throttled"` when the
/// owner's rate gate is closed. Never waits for the extraction itself.
pub async fn submit_extraction(
    State(state): State<AppState>,
    payload: Result<Json<SubmitExtraction>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<SubmitOutcome>>), AppError> {
    let start = Instant::now();
    let Json(body) = payload?;

    let outcome = state.memory_service.submit_extraction(body)?;
    let status = match outcome {
        SubmitOutcome::Enqueued { .. } => StatusCode::ACCEPTED,
        SubmitOutcome::Throttled => StatusCode::OK,
    };

    Ok((status, Json(ApiResponse::success(outcome, start))))
}
