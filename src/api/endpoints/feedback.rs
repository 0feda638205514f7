//! Feedback endpoints.
//!
//! - `POST /feedback` - store a new record
//! - `GET /feedback` - list with optional team filter and paging
//! - `GET /feedback/:id` - single record

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::{ApiError, AppState};
use crate::models::{FeedbackCreate, FeedbackRecord, ValidationError};
use crate::store::{ListFilter, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub team_id: Option<u32>,
    #[serde(default)]
    pub skip: u64,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

impl ListQuery {
    fn into_filter(self) -> Result<ListFilter, ValidationError> {
        if self.limit == 0 || self.limit > MAX_PAGE_LIMIT {
            return Err(ValidationError::Limit {
                value: self.limit,
                max: MAX_PAGE_LIMIT,
            });
        }
        Ok(ListFilter {
            team_id: self.team_id,
            skip: self.skip,
            limit: self.limit,
        })
    }
}

/// `POST /feedback` - validate and persist a feedback record.
pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<FeedbackCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<FeedbackRecord>), ApiError> {
    let Json(input) = body?;
    input.validate()?;

    let record = state.store.create(input).await?;
    tracing::info!(id = %record.id, team_id = record.team_id, "Feedback created");

    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /feedback` - newest first.
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<FeedbackRecord>>, ApiError> {
    let Query(query) = query?;
    let filter = query.into_filter()?;

    let records = state.store.list(filter).await?;
    Ok(Json(records))
}

/// `GET /feedback/:id`.
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FeedbackRecord>, ApiError> {
    state
        .store
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Feedback not found".to_string()))
}
