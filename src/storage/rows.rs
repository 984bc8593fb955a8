//! Database rows and their conversion into domain models
//!
//! Country lists are stored as JSON arrays in a TEXT column. Imported data
//! sometimes carries plain comma-separated text instead, which is accepted
//! on read.

use anyhow::Result;
use sqlx::FromRow;

use crate::models::{
    ClickEvent, DeviceType, FallbackCandidate, SessionRecord, TargetLink, UpdateFallbackCandidate,
    UpdateTargetLink,
};
use crate::routing::normalize_list;

#[derive(Debug, FromRow)]
pub(crate) struct LinkRow {
    pub id: i64,
    pub title: Option<String>,
    pub original_link: String,
    pub country_permissions: String,
    pub fallback_link: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<LinkRow> for TargetLink {
    fn from(row: LinkRow) -> Self {
        TargetLink {
            id: row.id,
            title: row.title,
            original_link: row.original_link,
            country_permissions: decode_countries(&row.country_permissions),
            fallback_link: row.fallback_link.filter(|s| !s.trim().is_empty()),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct CandidateRow {
    pub id: i64,
    pub url: String,
    pub allowed_countries: String,
    pub display_order: i64,
    pub is_active: bool,
    pub created_at: i64,
}

impl From<CandidateRow> for FallbackCandidate {
    fn from(row: CandidateRow) -> Self {
        FallbackCandidate {
            id: row.id,
            url: row.url,
            allowed_countries: decode_countries(&row.allowed_countries),
            display_order: row.display_order,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ClickRow {
    pub id: i64,
    pub link_id: i64,
    pub session_id: String,
    pub device_type: String,
    pub user_agent: Option<String>,
    pub country: Option<String>,
    pub ip: Option<String>,
    pub referrer: Option<String>,
    pub created_at: i64,
}

impl From<ClickRow> for ClickEvent {
    fn from(row: ClickRow) -> Self {
        ClickEvent {
            id: row.id,
            link_id: row.link_id,
            session_id: row.session_id,
            device_type: decode_device_type(&row.device_type),
            user_agent: row.user_agent,
            country: row.country,
            ip: row.ip,
            referrer: row.referrer,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct SessionRow {
    pub session_id: String,
    pub first_seen: i64,
    pub last_seen: i64,
    pub visit_count: i64,
    pub device_type: String,
    pub country: Option<String>,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        SessionRecord {
            session_id: row.session_id,
            first_seen: row.first_seen,
            last_seen: row.last_seen,
            visit_count: row.visit_count,
            device_type: decode_device_type(&row.device_type),
            country: row.country,
        }
    }
}

pub(crate) fn decode_countries(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    if raw.starts_with('[') {
        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(list) => return normalize_list(&list),
            Err(err) => {
                tracing::warn!(value = raw, error = %err, "malformed country list, reading as comma-separated");
            }
        }
    }

    let stripped = raw.trim_start_matches('[').trim_end_matches(']');
    let entries: Vec<&str> = stripped
        .split(',')
        .map(|s| s.trim().trim_matches('"'))
        .collect();
    normalize_list(&entries)
}

pub(crate) fn encode_countries(list: &[String]) -> Result<String> {
    Ok(serde_json::to_string(&normalize_list(list))?)
}

fn decode_device_type(raw: &str) -> DeviceType {
    raw.parse().unwrap_or(DeviceType::Desktop)
}

/// Merge a partial update into an existing link
pub(crate) fn apply_link_update(link: &mut TargetLink, update: &UpdateTargetLink) {
    if let Some(title) = &update.title {
        link.title = Some(title.clone()).filter(|t| !t.trim().is_empty());
    }
    if let Some(original_link) = &update.original_link {
        link.original_link = original_link.trim().to_string();
    }
    if let Some(countries) = &update.country_permissions {
        link.country_permissions = normalize_list(countries);
    }
    if let Some(fallback_link) = &update.fallback_link {
        link.fallback_link = Some(fallback_link.trim().to_string()).filter(|s| !s.is_empty());
    }
}

/// Merge a partial update into an existing candidate
pub(crate) fn apply_candidate_update(
    candidate: &mut FallbackCandidate,
    update: &UpdateFallbackCandidate,
) {
    if let Some(url) = &update.url {
        candidate.url = url.trim().to_string();
    }
    if let Some(countries) = &update.allowed_countries {
        candidate.allowed_countries = normalize_list(countries);
    }
    if let Some(order) = update.display_order {
        candidate.display_order = order;
    }
    if let Some(active) = update.is_active {
        candidate.is_active = active;
    }
}

pub(crate) fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_json_country_list() {
        assert_eq!(
            decode_countries(r#"["United States", " Canada ", ""]"#),
            vec!["United States", "Canada"]
        );
        assert!(decode_countries("[]").is_empty());
        assert!(decode_countries("").is_empty());
    }

    #[test]
    fn test_decode_comma_separated_country_list() {
        assert_eq!(
            decode_countries("France, Germany ,ALL"),
            vec!["France", "Germany", "ALL"]
        );
    }

    #[test]
    fn test_decode_malformed_json_falls_back_to_splitting() {
        assert_eq!(decode_countries(r#"["France", "Spain""#), vec!["France", "Spain"]);
    }

    #[test]
    fn test_encode_normalizes() {
        let encoded = encode_countries(&[" US ".to_string(), "us".to_string()]).unwrap();
        assert_eq!(encoded, r#"["US"]"#);
    }

    #[test]
    fn test_unknown_device_type_reads_as_desktop() {
        assert_eq!(decode_device_type("tablet"), DeviceType::Tablet);
        assert_eq!(decode_device_type("smart-fridge"), DeviceType::Desktop);
    }

    #[test]
    fn test_link_update_clears_fallback_with_empty_string() {
        let mut link = TargetLink {
            id: 1,
            title: Some("Offer".into()),
            original_link: "https://a.example".into(),
            country_permissions: vec!["US".into()],
            fallback_link: Some("https://b.example".into()),
            created_at: 0,
            updated_at: 0,
        };
        apply_link_update(
            &mut link,
            &UpdateTargetLink {
                fallback_link: Some("  ".into()),
                country_permissions: Some(vec!["FR".into(), " fr".into()]),
                ..Default::default()
            },
        );
        assert_eq!(link.fallback_link, None);
        assert_eq!(link.country_permissions, vec!["FR"]);
        assert_eq!(link.original_link, "https://a.example");
    }

    #[test]
    fn test_updates_trim_destination_urls() {
        let mut link = TargetLink {
            id: 1,
            title: None,
            original_link: "https://a.example".into(),
            country_permissions: vec![],
            fallback_link: None,
            created_at: 0,
            updated_at: 0,
        };
        apply_link_update(
            &mut link,
            &UpdateTargetLink {
                original_link: Some(" https://b.example/x ".into()),
                fallback_link: Some("\thttps://c.example ".into()),
                ..Default::default()
            },
        );
        assert_eq!(link.original_link, "https://b.example/x");
        assert_eq!(link.fallback_link.as_deref(), Some("https://c.example"));

        let mut candidate = FallbackCandidate {
            id: 1,
            url: "https://pool.example/a".into(),
            allowed_countries: vec![],
            display_order: 0,
            is_active: true,
            created_at: 0,
        };
        apply_candidate_update(
            &mut candidate,
            &UpdateFallbackCandidate {
                url: Some("  https://pool.example/b  ".into()),
                ..Default::default()
            },
        );
        assert_eq!(candidate.url, "https://pool.example/b");
    }
}
