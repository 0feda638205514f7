//! Liveness probe.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// `GET /` - always healthy while the process serves requests.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}
