//! GET /api/v1/health - Liveness plus the served layer set.

use std::time::Instant;

use axum::Json;
use serde::Serialize;

use strata_types::layer::Layer;

use crate::http::response::ApiResponse;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub layers: Vec<Layer>,
}

pub async fn health() -> Json<ApiResponse<HealthStatus>> {
    let start = Instant::now();
    Json(ApiResponse::success(
        HealthStatus {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            layers: Layer::ALL.to_vec(),
        },
        start,
    ))
}
