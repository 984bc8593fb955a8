use crate::models::{
    ClickEvent, FallbackCandidate, NewClickEvent, NewFallbackCandidate, NewLead, NewTargetLink,
    PrelanderConfig, PrelanderInput, PrelanderLead, SessionRecord, SessionVisit, TargetLink,
    UpdateFallbackCandidate, UpdateTargetLink,
};
use crate::storage::{Storage, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Read-through cache for the records the redirect hot path reads.
///
/// Target links, prelanders and the active fallback pool are cached with a
/// short TTL and invalidated on every write that goes through this wrapper.
/// Tracking writes and admin listings pass straight through.
pub struct CachedStorage {
    inner: Arc<dyn Storage>,
    links: Cache<i64, Option<TargetLink>>,
    prelanders: Cache<i64, Option<PrelanderConfig>>,
    /// Single-entry cache for the active rotation pool
    active_pool: Cache<(), Arc<Vec<FallbackCandidate>>>,
}

impl CachedStorage {
    pub fn new(inner: Arc<dyn Storage>, max_cache_entries: u64, ttl_secs: u64) -> Self {
        let ttl = Duration::from_secs(ttl_secs.max(1));

        Self {
            inner,
            links: Cache::builder()
                .max_capacity(max_cache_entries)
                .time_to_live(ttl)
                .build(),
            prelanders: Cache::builder()
                .max_capacity(max_cache_entries)
                .time_to_live(ttl)
                .build(),
            active_pool: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    async fn invalidate_link(&self, id: i64) {
        self.links.invalidate(&id).await;
        self.prelanders.invalidate(&id).await;
    }

    async fn invalidate_pool(&self) {
        self.active_pool.invalidate(&()).await;
    }
}

#[async_trait]
impl Storage for CachedStorage {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn create_link(&self, link: &NewTargetLink) -> Result<TargetLink> {
        let created = self.inner.create_link(link).await?;
        self.links.insert(created.id, Some(created.clone())).await;
        Ok(created)
    }

    async fn get_link(&self, id: i64) -> Result<Option<TargetLink>> {
        if let Some(cached) = self.links.get(&id).await {
            return Ok(cached);
        }

        let result = self.inner.get_link(id).await?;
        self.links.insert(id, result.clone()).await;
        Ok(result)
    }

    async fn list_links(&self, limit: i64, offset: i64) -> Result<Vec<TargetLink>> {
        self.inner.list_links(limit, offset).await
    }

    async fn update_link(&self, id: i64, update: &UpdateTargetLink) -> Result<Option<TargetLink>> {
        let result = self.inner.update_link(id, update).await?;
        self.invalidate_link(id).await;
        Ok(result)
    }

    async fn delete_link(&self, id: i64) -> Result<bool> {
        let deleted = self.inner.delete_link(id).await?;
        if deleted {
            self.invalidate_link(id).await;
        }
        Ok(deleted)
    }

    async fn create_candidate(&self, candidate: &NewFallbackCandidate) -> Result<FallbackCandidate> {
        let created = self.inner.create_candidate(candidate).await?;
        self.invalidate_pool().await;
        Ok(created)
    }

    async fn get_candidate(&self, id: i64) -> Result<Option<FallbackCandidate>> {
        self.inner.get_candidate(id).await
    }

    async fn list_candidates(&self, active_only: bool) -> Result<Vec<FallbackCandidate>> {
        if !active_only {
            return self.inner.list_candidates(false).await;
        }

        if let Some(pool) = self.active_pool.get(&()).await {
            return Ok(pool.as_ref().clone());
        }

        let pool = self.inner.list_candidates(true).await?;
        self.active_pool.insert((), Arc::new(pool.clone())).await;
        Ok(pool)
    }

    async fn update_candidate(
        &self,
        id: i64,
        update: &UpdateFallbackCandidate,
    ) -> Result<Option<FallbackCandidate>> {
        let result = self.inner.update_candidate(id, update).await?;
        self.invalidate_pool().await;
        Ok(result)
    }

    async fn delete_candidate(&self, id: i64) -> Result<bool> {
        let deleted = self.inner.delete_candidate(id).await?;
        if deleted {
            self.invalidate_pool().await;
        }
        Ok(deleted)
    }

    async fn upsert_prelander(
        &self,
        link_id: i64,
        input: &PrelanderInput,
    ) -> StorageResult<PrelanderConfig> {
        let prelander = self.inner.upsert_prelander(link_id, input).await?;
        self.prelanders
            .insert(link_id, Some(prelander.clone()))
            .await;
        Ok(prelander)
    }

    async fn get_prelander_for_link(&self, link_id: i64) -> Result<Option<PrelanderConfig>> {
        if let Some(cached) = self.prelanders.get(&link_id).await {
            return Ok(cached);
        }

        let result = self.inner.get_prelander_for_link(link_id).await?;
        self.prelanders.insert(link_id, result.clone()).await;
        Ok(result)
    }

    async fn delete_prelander(&self, link_id: i64) -> Result<bool> {
        let deleted = self.inner.delete_prelander(link_id).await?;
        self.prelanders.invalidate(&link_id).await;
        Ok(deleted)
    }

    async fn insert_lead(&self, lead: &NewLead) -> Result<PrelanderLead> {
        self.inner.insert_lead(lead).await
    }

    async fn list_leads(&self, link_id: i64, limit: i64, offset: i64) -> Result<Vec<PrelanderLead>> {
        self.inner.list_leads(link_id, limit, offset).await
    }

    async fn insert_click(&self, click: &NewClickEvent) -> Result<ClickEvent> {
        self.inner.insert_click(click).await
    }

    async fn list_clicks(
        &self,
        link_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ClickEvent>> {
        self.inner.list_clicks(link_id, limit, offset).await
    }

    async fn count_clicks(&self, link_id: Option<i64>) -> Result<i64> {
        self.inner.count_clicks(link_id).await
    }

    async fn touch_session(&self, visit: &SessionVisit) -> Result<()> {
        self.inner.touch_session(visit).await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        self.inner.get_session(session_id).await
    }
}
