use crate::models::{
    ClickEvent, FallbackCandidate, NewClickEvent, NewFallbackCandidate, NewLead, NewTargetLink,
    PrelanderConfig, PrelanderInput, PrelanderLead, SessionRecord, SessionVisit, TargetLink,
    UpdateFallbackCandidate, UpdateTargetLink,
};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("referenced record does not exist")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Other(err.into())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables, indexes)
    async fn init(&self) -> Result<()>;

    // Target links

    async fn create_link(&self, link: &NewTargetLink) -> Result<TargetLink>;

    async fn get_link(&self, id: i64) -> Result<Option<TargetLink>>;

    /// Newest first
    async fn list_links(&self, limit: i64, offset: i64) -> Result<Vec<TargetLink>>;

    /// Returns `None` when the link does not exist
    async fn update_link(&self, id: i64, update: &UpdateTargetLink) -> Result<Option<TargetLink>>;

    /// Deletes the link together with its prelander and leads
    async fn delete_link(&self, id: i64) -> Result<bool>;

    // Fallback rotation pool

    async fn create_candidate(&self, candidate: &NewFallbackCandidate) -> Result<FallbackCandidate>;

    async fn get_candidate(&self, id: i64) -> Result<Option<FallbackCandidate>>;

    /// Ordered ascending by `display_order`, ties by `id`
    async fn list_candidates(&self, active_only: bool) -> Result<Vec<FallbackCandidate>>;

    async fn update_candidate(
        &self,
        id: i64,
        update: &UpdateFallbackCandidate,
    ) -> Result<Option<FallbackCandidate>>;

    async fn delete_candidate(&self, id: i64) -> Result<bool>;

    // Prelanders, at most one per link

    /// Fails with `NotFound` when the link does not exist
    async fn upsert_prelander(
        &self,
        link_id: i64,
        input: &PrelanderInput,
    ) -> StorageResult<PrelanderConfig>;

    async fn get_prelander_for_link(&self, link_id: i64) -> Result<Option<PrelanderConfig>>;

    async fn delete_prelander(&self, link_id: i64) -> Result<bool>;

    async fn insert_lead(&self, lead: &NewLead) -> Result<PrelanderLead>;

    async fn list_leads(&self, link_id: i64, limit: i64, offset: i64) -> Result<Vec<PrelanderLead>>;

    // Tracking

    async fn insert_click(&self, click: &NewClickEvent) -> Result<ClickEvent>;

    /// Newest first, optionally restricted to one link
    async fn list_clicks(
        &self,
        link_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ClickEvent>>;

    async fn count_clicks(&self, link_id: Option<i64>) -> Result<i64>;

    /// Create the session on first sight, otherwise bump `last_seen` and `visit_count`
    async fn touch_session(&self, visit: &SessionVisit) -> Result<()>;

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>>;
}
