use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::{NewClickEvent, SessionVisit};
use crate::storage::Storage;

/// Best-effort writer for click and session tracking
#[derive(Clone)]
pub struct ClickTracker {
    storage: Arc<dyn Storage>,
    timeout: Duration,
}

impl ClickTracker {
    pub fn new(storage: Arc<dyn Storage>, timeout_ms: u64) -> Self {
        Self {
            storage,
            timeout: Duration::from_millis(timeout_ms.max(1)),
        }
    }

    /// Record a click; never fails
    pub async fn record_click(&self, event: NewClickEvent) {
        let link_id = event.link_id;
        match tokio::time::timeout(self.timeout, self.storage.insert_click(&event)).await {
            Ok(Ok(click)) => debug!(link_id, click_id = click.id, "recorded click"),
            Ok(Err(err)) => warn!(link_id, error = %err, "failed to record click"),
            Err(_) => warn!(link_id, timeout_ms = self.timeout.as_millis() as u64, "click recording timed out"),
        }
    }

    /// Upsert the session summary for a visit; never fails
    pub async fn record_visit(&self, visit: SessionVisit) {
        match tokio::time::timeout(self.timeout, self.storage.touch_session(&visit)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(session_id = %visit.session_id, error = %err, "failed to record session visit")
            }
            Err(_) => warn!(session_id = %visit.session_id, "session visit recording timed out"),
        }
    }

    /// Record both halves of a tracked click concurrently
    pub async fn record(&self, event: NewClickEvent, visit: SessionVisit) {
        tokio::join!(self.record_click(event), self.record_visit(visit));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ClickEvent, DeviceType, FallbackCandidate, NewFallbackCandidate, NewLead, NewTargetLink,
        PrelanderConfig, PrelanderInput, PrelanderLead, SessionRecord, TargetLink,
        UpdateFallbackCandidate, UpdateTargetLink,
    };
    use crate::storage::{SqliteStorage, StorageResult};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::time::Instant;

    /// Delegates to SQLite but stalls every tracking write
    struct StalledTracking {
        inner: SqliteStorage,
        delay: Duration,
    }

    #[async_trait]
    impl Storage for StalledTracking {
        async fn init(&self) -> Result<()> {
            self.inner.init().await
        }
        async fn create_link(&self, link: &NewTargetLink) -> Result<TargetLink> {
            self.inner.create_link(link).await
        }
        async fn get_link(&self, id: i64) -> Result<Option<TargetLink>> {
            self.inner.get_link(id).await
        }
        async fn list_links(&self, limit: i64, offset: i64) -> Result<Vec<TargetLink>> {
            self.inner.list_links(limit, offset).await
        }
        async fn update_link(&self, id: i64, update: &UpdateTargetLink) -> Result<Option<TargetLink>> {
            self.inner.update_link(id, update).await
        }
        async fn delete_link(&self, id: i64) -> Result<bool> {
            self.inner.delete_link(id).await
        }
        async fn create_candidate(&self, candidate: &NewFallbackCandidate) -> Result<FallbackCandidate> {
            self.inner.create_candidate(candidate).await
        }
        async fn get_candidate(&self, id: i64) -> Result<Option<FallbackCandidate>> {
            self.inner.get_candidate(id).await
        }
        async fn list_candidates(&self, active_only: bool) -> Result<Vec<FallbackCandidate>> {
            self.inner.list_candidates(active_only).await
        }
        async fn update_candidate(
            &self,
            id: i64,
            update: &UpdateFallbackCandidate,
        ) -> Result<Option<FallbackCandidate>> {
            self.inner.update_candidate(id, update).await
        }
        async fn delete_candidate(&self, id: i64) -> Result<bool> {
            self.inner.delete_candidate(id).await
        }
        async fn upsert_prelander(
            &self,
            link_id: i64,
            input: &PrelanderInput,
        ) -> StorageResult<PrelanderConfig> {
            self.inner.upsert_prelander(link_id, input).await
        }
        async fn get_prelander_for_link(&self, link_id: i64) -> Result<Option<PrelanderConfig>> {
            self.inner.get_prelander_for_link(link_id).await
        }
        async fn delete_prelander(&self, link_id: i64) -> Result<bool> {
            self.inner.delete_prelander(link_id).await
        }
        async fn insert_lead(&self, lead: &NewLead) -> Result<PrelanderLead> {
            self.inner.insert_lead(lead).await
        }
        async fn list_leads(&self, link_id: i64, limit: i64, offset: i64) -> Result<Vec<PrelanderLead>> {
            self.inner.list_leads(link_id, limit, offset).await
        }
        async fn insert_click(&self, click: &NewClickEvent) -> Result<ClickEvent> {
            tokio::time::sleep(self.delay).await;
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
            tokio::time::sleep(self.delay).await;
            self.inner.touch_session(visit).await
        }
        async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
            self.inner.get_session(session_id).await
        }
    }

    async fn stalled_storage(delay: Duration) -> Arc<dyn Storage> {
        let inner = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
        inner.init().await.unwrap();
        Arc::new(StalledTracking { inner, delay })
    }

    fn click(link_id: i64) -> (NewClickEvent, SessionVisit) {
        let session_id = "sess_1700000000000_abcdefghi".to_string();
        (
            NewClickEvent {
                link_id,
                session_id: session_id.clone(),
                device_type: DeviceType::Desktop,
                user_agent: None,
                country: Some("Germany".to_string()),
                ip: None,
                referrer: None,
            },
            SessionVisit {
                session_id,
                device_type: DeviceType::Desktop,
                country: Some("Germany".to_string()),
            },
        )
    }

    #[tokio::test]
    async fn test_slow_tracking_is_abandoned_after_timeout() {
        let storage = stalled_storage(Duration::from_secs(10)).await;
        let tracker = ClickTracker::new(Arc::clone(&storage), 50);
        let (event, visit) = click(1);

        let started = Instant::now();
        tracker.record(event, visit.clone()).await;
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "record took {:?}",
            started.elapsed()
        );

        assert_eq!(storage.count_clicks(Some(1)).await.unwrap(), 0);
        assert!(storage.get_session(&visit.session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fast_tracking_completes() {
        let storage = stalled_storage(Duration::ZERO).await;
        let tracker = ClickTracker::new(Arc::clone(&storage), 1_000);
        let (event, visit) = click(7);

        tracker.record(event, visit.clone()).await;

        assert_eq!(storage.count_clicks(Some(7)).await.unwrap(), 1);
        let session = storage.get_session(&visit.session_id).await.unwrap().unwrap();
        assert_eq!(session.visit_count, 1);
    }
}
