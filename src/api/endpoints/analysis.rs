//! `GET /ai_analysis` - model-written performance report.

use axum::extract::State;
use axum::Json;

use crate::api::{ApiError, AppState};
use crate::models::AnalysisResult;

/// Analyse every stored record. With no records the model is not called.
pub async fn run(State(state): State<AppState>) -> Result<Json<AnalysisResult>, ApiError> {
    let records = state.store.list_all().await?;

    if records.is_empty() {
        return Err(ApiError::NotFound("No feedbacks found".to_string()));
    }

    let result = state.analyzer.analyze(&records).await?;
    Ok(Json(result))
}
