//! Admin endpoints for the fallback rotation pool

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::handlers::{api_error, internal_error, validate_url, ApiResult, AppState, SuccessResponse};
use crate::models::{FallbackCandidate, NewFallbackCandidate, UpdateFallbackCandidate};
use crate::routing::{next_candidate, RotationCursor};

#[derive(Debug, Deserialize)]
pub struct CandidateListQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    #[serde(default)]
    pub country: String,
    pub cursor: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RotationPreview {
    pub candidate: Option<FallbackCandidate>,
    pub next_index: RotationCursor,
    pub pool_size: usize,
}

pub async fn create_candidate(
    State(state): State<Arc<AppState>>,
    Json(mut payload): Json<NewFallbackCandidate>,
) -> ApiResult<(StatusCode, Json<FallbackCandidate>)> {
    payload.url = payload.url.trim().to_string();
    validate_url("url", &payload.url)?;

    match state.storage.create_candidate(&payload).await {
        Ok(candidate) => Ok((StatusCode::CREATED, Json(candidate))),
        Err(e) => Err(internal_error("create fallback candidate", e)),
    }
}

/// All candidates in rotation order
pub async fn list_candidates(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CandidateListQuery>,
) -> ApiResult<Json<Vec<FallbackCandidate>>> {
    state
        .storage
        .list_candidates(query.active_only)
        .await
        .map(Json)
        .map_err(|e| internal_error("list fallback candidates", e))
}

pub async fn get_candidate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<FallbackCandidate>> {
    match state.storage.get_candidate(id).await {
        Ok(Some(candidate)) => Ok(Json(candidate)),
        Ok(None) => Err(api_error(StatusCode::NOT_FOUND, "Fallback candidate not found")),
        Err(e) => Err(internal_error("get fallback candidate", e)),
    }
}

pub async fn update_candidate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateFallbackCandidate>,
) -> ApiResult<Json<FallbackCandidate>> {
    if let Some(url) = payload.url.as_deref() {
        validate_url("url", url)?;
    }

    match state.storage.update_candidate(id, &payload).await {
        Ok(Some(candidate)) => Ok(Json(candidate)),
        Ok(None) => Err(api_error(StatusCode::NOT_FOUND, "Fallback candidate not found")),
        Err(e) => Err(internal_error("update fallback candidate", e)),
    }
}

pub async fn delete_candidate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SuccessResponse>> {
    match state.storage.delete_candidate(id).await {
        Ok(true) => Ok(Json(SuccessResponse {
            message: "Fallback candidate deleted successfully".to_string(),
        })),
        Ok(false) => Err(api_error(StatusCode::NOT_FOUND, "Fallback candidate not found")),
        Err(e) => Err(internal_error("delete fallback candidate", e)),
    }
}

/// Which candidate a visitor from `country` with `cursor` would get next; persists nothing
pub async fn preview_rotation(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PreviewQuery>,
) -> ApiResult<Json<RotationPreview>> {
    let pool = state
        .storage
        .list_candidates(true)
        .await
        .map_err(|e| internal_error("load fallback pool", e))?;

    let cursor = query.cursor.map(RotationCursor).unwrap_or_default();
    let rotation = next_candidate(&pool, &query.country, cursor);

    Ok(Json(RotationPreview {
        candidate: rotation.next.cloned(),
        next_index: rotation.next_index,
        pool_size: pool.len(),
    }))
}
