use crate::models::{
    ClickEvent, FallbackCandidate, NewClickEvent, NewFallbackCandidate, NewLead, NewTargetLink,
    PrelanderConfig, PrelanderInput, PrelanderLead, SessionRecord, SessionVisit, TargetLink,
    UpdateFallbackCandidate, UpdateTargetLink,
};
use crate::storage::rows::{
    apply_candidate_update, apply_link_update, encode_countries, now_secs, CandidateRow,
    ClickRow, LinkRow, SessionRow,
};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS target_links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT,
                original_link TEXT NOT NULL,
                country_permissions TEXT NOT NULL DEFAULT '[]',
                fallback_link TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fallback_candidates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                allowed_countries TEXT NOT NULL DEFAULT '[]',
                display_order INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_fallback_order ON fallback_candidates(is_active, display_order)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS prelanders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link_id INTEGER NOT NULL UNIQUE,
                headline TEXT NOT NULL,
                description TEXT,
                button_text TEXT NOT NULL,
                is_enabled INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS prelander_leads (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link_id INTEGER NOT NULL,
                prelander_id INTEGER NOT NULL,
                email TEXT NOT NULL,
                session_id TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_leads_link ON prelander_leads(link_id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clicks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link_id INTEGER NOT NULL,
                session_id TEXT NOT NULL,
                device_type TEXT NOT NULL,
                user_agent TEXT,
                country TEXT,
                ip TEXT,
                referrer TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_clicks_link ON clicks(link_id, created_at)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                first_seen INTEGER NOT NULL,
                last_seen INTEGER NOT NULL,
                visit_count INTEGER NOT NULL DEFAULT 1,
                device_type TEXT NOT NULL,
                country TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create_link(&self, link: &NewTargetLink) -> Result<TargetLink> {
        let now = now_secs();
        let fallback_link = link
            .fallback_link
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            INSERT INTO target_links (title, original_link, country_permissions, fallback_link, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, title, original_link, country_permissions, fallback_link, created_at, updated_at
            "#,
        )
        .bind(link.title.as_deref())
        .bind(&link.original_link)
        .bind(encode_countries(&link.country_permissions)?)
        .bind(fallback_link)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row.into())
    }

    async fn get_link(&self, id: i64) -> Result<Option<TargetLink>> {
        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT id, title, original_link, country_permissions, fallback_link, created_at, updated_at
            FROM target_links
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_links(&self, limit: i64, offset: i64) -> Result<Vec<TargetLink>> {
        let rows = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT id, title, original_link, country_permissions, fallback_link, created_at, updated_at
            FROM target_links
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_link(&self, id: i64, update: &UpdateTargetLink) -> Result<Option<TargetLink>> {
        let Some(mut link) = self.get_link(id).await? else {
            return Ok(None);
        };
        apply_link_update(&mut link, update);

        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            UPDATE target_links
            SET title = ?, original_link = ?, country_permissions = ?, fallback_link = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, title, original_link, country_permissions, fallback_link, created_at, updated_at
            "#,
        )
        .bind(link.title.as_deref())
        .bind(&link.original_link)
        .bind(encode_countries(&link.country_permissions)?)
        .bind(link.fallback_link.as_deref())
        .bind(now_secs())
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn delete_link(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM prelander_leads WHERE link_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM prelanders WHERE link_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM target_links WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_candidate(&self, candidate: &NewFallbackCandidate) -> Result<FallbackCandidate> {
        let row = sqlx::query_as::<_, CandidateRow>(
            r#"
            INSERT INTO fallback_candidates (url, allowed_countries, display_order, is_active, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, url, allowed_countries, display_order, is_active, created_at
            "#,
        )
        .bind(&candidate.url)
        .bind(encode_countries(&candidate.allowed_countries)?)
        .bind(candidate.display_order)
        .bind(candidate.is_active)
        .bind(now_secs())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row.into())
    }

    async fn get_candidate(&self, id: i64) -> Result<Option<FallbackCandidate>> {
        let row = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT id, url, allowed_countries, display_order, is_active, created_at
            FROM fallback_candidates
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_candidates(&self, active_only: bool) -> Result<Vec<FallbackCandidate>> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT id, url, allowed_countries, display_order, is_active, created_at
            FROM fallback_candidates
            WHERE (? = 0 OR is_active = 1)
            ORDER BY display_order ASC, id ASC
            "#,
        )
        .bind(active_only)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_candidate(
        &self,
        id: i64,
        update: &UpdateFallbackCandidate,
    ) -> Result<Option<FallbackCandidate>> {
        let Some(mut candidate) = self.get_candidate(id).await? else {
            return Ok(None);
        };
        apply_candidate_update(&mut candidate, update);

        let row = sqlx::query_as::<_, CandidateRow>(
            r#"
            UPDATE fallback_candidates
            SET url = ?, allowed_countries = ?, display_order = ?, is_active = ?
            WHERE id = ?
            RETURNING id, url, allowed_countries, display_order, is_active, created_at
            "#,
        )
        .bind(&candidate.url)
        .bind(encode_countries(&candidate.allowed_countries)?)
        .bind(candidate.display_order)
        .bind(candidate.is_active)
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn delete_candidate(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM fallback_candidates WHERE id = ?")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_prelander(
        &self,
        link_id: i64,
        input: &PrelanderInput,
    ) -> StorageResult<PrelanderConfig> {
        if self.get_link(link_id).await?.is_none() {
            return Err(StorageError::NotFound);
        }

        let now = now_secs();
        let prelander = sqlx::query_as::<_, PrelanderConfig>(
            r#"
            INSERT INTO prelanders (link_id, headline, description, button_text, is_enabled, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(link_id) DO UPDATE SET
                headline = excluded.headline,
                description = excluded.description,
                button_text = excluded.button_text,
                is_enabled = excluded.is_enabled,
                updated_at = excluded.updated_at
            RETURNING id, link_id, headline, description, button_text, is_enabled, created_at, updated_at
            "#,
        )
        .bind(link_id)
        .bind(&input.headline)
        .bind(input.description.as_deref())
        .bind(&input.button_text)
        .bind(input.is_enabled)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(prelander)
    }

    async fn get_prelander_for_link(&self, link_id: i64) -> Result<Option<PrelanderConfig>> {
        let prelander = sqlx::query_as::<_, PrelanderConfig>(
            r#"
            SELECT id, link_id, headline, description, button_text, is_enabled, created_at, updated_at
            FROM prelanders
            WHERE link_id = ?
            "#,
        )
        .bind(link_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(prelander)
    }

    async fn delete_prelander(&self, link_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM prelanders WHERE link_id = ?")
            .bind(link_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_lead(&self, lead: &NewLead) -> Result<PrelanderLead> {
        let lead = sqlx::query_as::<_, PrelanderLead>(
            r#"
            INSERT INTO prelander_leads (link_id, prelander_id, email, session_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, link_id, prelander_id, email, session_id, created_at
            "#,
        )
        .bind(lead.link_id)
        .bind(lead.prelander_id)
        .bind(&lead.email)
        .bind(lead.session_id.as_deref())
        .bind(now_secs())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(lead)
    }

    async fn list_leads(&self, link_id: i64, limit: i64, offset: i64) -> Result<Vec<PrelanderLead>> {
        let leads = sqlx::query_as::<_, PrelanderLead>(
            r#"
            SELECT id, link_id, prelander_id, email, session_id, created_at
            FROM prelander_leads
            WHERE link_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(link_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(leads)
    }

    async fn insert_click(&self, click: &NewClickEvent) -> Result<ClickEvent> {
        let row = sqlx::query_as::<_, ClickRow>(
            r#"
            INSERT INTO clicks (link_id, session_id, device_type, user_agent, country, ip, referrer, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, link_id, session_id, device_type, user_agent, country, ip, referrer, created_at
            "#,
        )
        .bind(click.link_id)
        .bind(&click.session_id)
        .bind(click.device_type.as_str())
        .bind(click.user_agent.as_deref())
        .bind(click.country.as_deref())
        .bind(click.ip.as_deref())
        .bind(click.referrer.as_deref())
        .bind(now_secs())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row.into())
    }

    async fn list_clicks(
        &self,
        link_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ClickEvent>> {
        let rows = sqlx::query_as::<_, ClickRow>(
            r#"
            SELECT id, link_id, session_id, device_type, user_agent, country, ip, referrer, created_at
            FROM clicks
            WHERE (?1 IS NULL OR link_id = ?1)
            ORDER BY created_at DESC, id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(link_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_clicks(&self, link_id: Option<i64>) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM clicks WHERE (?1 IS NULL OR link_id = ?1)",
        )
        .bind(link_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn touch_session(&self, visit: &SessionVisit) -> Result<()> {
        let now = now_secs();

        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, first_seen, last_seen, visit_count, device_type, country)
            VALUES (?, ?, ?, 1, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                last_seen = excluded.last_seen,
                visit_count = sessions.visit_count + 1,
                device_type = excluded.device_type,
                country = COALESCE(excluded.country, sessions.country)
            "#,
        )
        .bind(&visit.session_id)
        .bind(now)
        .bind(now)
        .bind(visit.device_type.as_str())
        .bind(visit.country.as_deref())
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT session_id, first_seen, last_seen, visit_count, device_type, country
            FROM sessions
            WHERE session_id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Into::into))
    }
}
