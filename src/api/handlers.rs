use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{
    ClickEvent, NewTargetLink, PrelanderConfig, PrelanderInput, PrelanderLead, SessionRecord,
    TargetLink, UpdateTargetLink,
};
use crate::storage::{Storage, StorageError};

pub struct AppState {
    pub storage: Arc<dyn Storage>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<T, ApiError>;

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub(crate) fn internal_error(action: &str, err: impl std::fmt::Display) -> ApiError {
    tracing::error!(error = %err, "failed to {action}");
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Failed to {action}: {err}"),
    )
}

fn not_found(what: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("{what} not found"))
}

/// Destinations must be absolute http(s) URLs usable as a `Location` header
pub(crate) fn validate_url(field: &str, url: &str) -> ApiResult<()> {
    let url = url.trim();
    if url.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("{field} cannot be empty"),
        ));
    }
    let has_scheme = url.starts_with("http://") || url.starts_with("https://");
    let printable = url.bytes().all(|b| b.is_ascii_graphic());
    if !has_scheme || !printable {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("{field} must be an absolute http(s) URL"),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

impl ListQuery {
    pub(crate) fn bounds(&self) -> (i64, i64) {
        (self.limit.clamp(1, 500), self.offset.max(0))
    }
}

#[derive(Debug, Serialize)]
pub struct ClickPage {
    pub total: i64,
    pub clicks: Vec<ClickEvent>,
}

/// Create a target link
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Json(mut payload): Json<NewTargetLink>,
) -> ApiResult<(StatusCode, Json<TargetLink>)> {
    payload.original_link = payload.original_link.trim().to_string();
    validate_url("original_link", &payload.original_link)?;
    payload.fallback_link = payload
        .fallback_link
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty());
    if let Some(fallback) = payload.fallback_link.as_deref() {
        validate_url("fallback_link", fallback)?;
    }

    match state.storage.create_link(&payload).await {
        Ok(link) => Ok((StatusCode::CREATED, Json(link))),
        Err(e) => Err(internal_error("create link", e)),
    }
}

/// List target links, newest first
pub async fn list_links(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<TargetLink>>> {
    let (limit, offset) = query.bounds();
    state
        .storage
        .list_links(limit, offset)
        .await
        .map(Json)
        .map_err(|e| internal_error("list links", e))
}

pub async fn get_link(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TargetLink>> {
    match state.storage.get_link(id).await {
        Ok(Some(link)) => Ok(Json(link)),
        Ok(None) => Err(not_found("Link")),
        Err(e) => Err(internal_error("get link", e)),
    }
}

pub async fn update_link(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTargetLink>,
) -> ApiResult<Json<TargetLink>> {
    if let Some(url) = payload.original_link.as_deref() {
        validate_url("original_link", url)?;
    }
    if let Some(fallback) = payload.fallback_link.as_deref().filter(|f| !f.trim().is_empty()) {
        validate_url("fallback_link", fallback)?;
    }

    match state.storage.update_link(id, &payload).await {
        Ok(Some(link)) => Ok(Json(link)),
        Ok(None) => Err(not_found("Link")),
        Err(e) => Err(internal_error("update link", e)),
    }
}

pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SuccessResponse>> {
    match state.storage.delete_link(id).await {
        Ok(true) => Ok(Json(SuccessResponse {
            message: "Link deleted successfully".to_string(),
        })),
        Ok(false) => Err(not_found("Link")),
        Err(e) => Err(internal_error("delete link", e)),
    }
}

pub async fn get_prelander(
    State(state): State<Arc<AppState>>,
    Path(link_id): Path<i64>,
) -> ApiResult<Json<PrelanderConfig>> {
    match state.storage.get_prelander_for_link(link_id).await {
        Ok(Some(prelander)) => Ok(Json(prelander)),
        Ok(None) => Err(not_found("Prelander")),
        Err(e) => Err(internal_error("get prelander", e)),
    }
}

/// Create or replace the prelander of a link
pub async fn put_prelander(
    State(state): State<Arc<AppState>>,
    Path(link_id): Path<i64>,
    Json(payload): Json<PrelanderInput>,
) -> ApiResult<Json<PrelanderConfig>> {
    if payload.headline.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "headline cannot be empty"));
    }
    if payload.button_text.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "button_text cannot be empty"));
    }

    match state.storage.upsert_prelander(link_id, &payload).await {
        Ok(prelander) => Ok(Json(prelander)),
        Err(StorageError::NotFound) => Err(not_found("Link")),
        Err(StorageError::Other(e)) => Err(internal_error("save prelander", e)),
    }
}

pub async fn delete_prelander(
    State(state): State<Arc<AppState>>,
    Path(link_id): Path<i64>,
) -> ApiResult<Json<SuccessResponse>> {
    match state.storage.delete_prelander(link_id).await {
        Ok(true) => Ok(Json(SuccessResponse {
            message: "Prelander deleted successfully".to_string(),
        })),
        Ok(false) => Err(not_found("Prelander")),
        Err(e) => Err(internal_error("delete prelander", e)),
    }
}

pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    Path(link_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<PrelanderLead>>> {
    let (limit, offset) = query.bounds();
    state
        .storage
        .list_leads(link_id, limit, offset)
        .await
        .map(Json)
        .map_err(|e| internal_error("list leads", e))
}

async fn click_page(state: &AppState, link_id: Option<i64>, query: &ListQuery) -> ApiResult<ClickPage> {
    let (limit, offset) = query.bounds();
    let (total, clicks) = tokio::try_join!(
        state.storage.count_clicks(link_id),
        state.storage.list_clicks(link_id, limit, offset),
    )
    .map_err(|e| internal_error("list clicks", e))?;
    Ok(ClickPage { total, clicks })
}

pub async fn list_link_clicks(
    State(state): State<Arc<AppState>>,
    Path(link_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ClickPage>> {
    click_page(&state, Some(link_id), &query).await.map(Json)
}

pub async fn list_clicks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ClickPage>> {
    click_page(&state, None, &query).await.map(Json)
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionRecord>> {
    match state.storage.get_session(&session_id).await {
        Ok(Some(session)) => Ok(Json(session)),
        Ok(None) => Err(not_found("Session")),
        Err(e) => Err(internal_error("get session", e)),
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
