//! Per-visit redirect decision for `/go`
//!
//! Start → Resolving → Tracking → Permission check → one navigation.
//! Geolocation and the record fetches run concurrently; tracking is
//! attempted before the decision is returned but can never fail it.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use std::net::IpAddr;
use thiserror::Error;
use tracing::{debug, error};

use super::handlers::RedirectState;
use super::pages;
use crate::models::{DeviceType, NewClickEvent, SessionVisit};
use crate::routing::is_allowed;
use crate::token::FallbackClaims;

/// One visitor request as seen by the flow
#[derive(Debug, Clone)]
pub struct Visit {
    pub client_ip: IpAddr,
    pub session_id: String,
    pub device_type: DeviceType,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// Where the visitor is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// Straight to the link's primary URL
    Direct { url: String },
    /// Through the email-capture interstitial
    Prelander { link_id: i64 },
    /// To the region-fallback endpoint with a signed token
    Fallback { token: String },
}

impl RedirectOutcome {
    pub fn location(&self) -> String {
        match self {
            RedirectOutcome::Direct { url } => url.clone(),
            RedirectOutcome::Prelander { link_id } => format!("/prelander?id={link_id}"),
            RedirectOutcome::Fallback { token } => format!("/fallback?token={token}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("Invalid link")]
    InvalidLink,
    #[error("Link not found")]
    LinkNotFound,
    #[error("An error occurred")]
    Internal(#[source] anyhow::Error),
}

impl RedirectError {
    pub fn status(&self) -> StatusCode {
        match self {
            RedirectError::InvalidLink => StatusCode::BAD_REQUEST,
            RedirectError::LinkNotFound => StatusCode::NOT_FOUND,
            RedirectError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render with the cookies collected so far
    pub fn into_page(self, cookies: HeaderMap) -> Response {
        if let RedirectError::Internal(ref err) = self {
            error!(error = ?err, "redirect flow failed");
        }
        pages::message_page(self.status(), cookies, &self.to_string())
    }
}

impl IntoResponse for RedirectError {
    fn into_response(self) -> Response {
        self.into_page(HeaderMap::new())
    }
}

/// Parse a link identifier from the request; blank or non-numeric is invalid
pub fn parse_link_id(raw: Option<&str>) -> Result<i64, RedirectError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(RedirectError::InvalidLink)
}

/// Decide where a `/go` visit navigates to
pub async fn resolve(
    state: &RedirectState,
    raw_link_id: Option<&str>,
    visit: &Visit,
) -> Result<RedirectOutcome, RedirectError> {
    let link_id = parse_link_id(raw_link_id)?;

    let (geo, link, prelander) = tokio::join!(
        state.geo.locate(visit.client_ip),
        state.storage.get_link(link_id),
        state.storage.get_prelander_for_link(link_id),
    );

    let link = link
        .map_err(RedirectError::Internal)?
        .ok_or(RedirectError::LinkNotFound)?;
    let prelander = prelander.map_err(RedirectError::Internal)?;

    let country = geo.country_opt();
    let click = NewClickEvent {
        link_id,
        session_id: visit.session_id.clone(),
        device_type: visit.device_type,
        user_agent: visit.user_agent.clone(),
        country: country.clone(),
        ip: Some(geo.ip.clone()).filter(|ip| !ip.is_empty()),
        referrer: visit.referrer.clone(),
    };
    let session = SessionVisit {
        session_id: visit.session_id.clone(),
        device_type: visit.device_type,
        country,
    };
    state.tracker.record(click, session).await;

    if is_allowed(&link.country_permissions, &geo.country) {
        let outcome = match prelander {
            Some(p) if p.is_enabled => RedirectOutcome::Prelander { link_id },
            _ => RedirectOutcome::Direct {
                url: link.original_link,
            },
        };
        debug!(link_id, country = %geo.country, ?outcome, "visitor allowed");
        return Ok(outcome);
    }

    let claims = FallbackClaims {
        link_id,
        session_id: visit.session_id.clone(),
        country: geo.country.clone(),
        issued_at: chrono::Utc::now().timestamp(),
    };
    let token = state
        .tokens
        .issue(&claims)
        .map_err(|e| RedirectError::Internal(e.into()))?;

    debug!(link_id, country = %geo.country, "visitor outside allowed countries, sending to fallback");
    Ok(RedirectOutcome::Fallback { token })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_link_id() {
        assert_eq!(parse_link_id(Some("42")).unwrap(), 42);
        assert_eq!(parse_link_id(Some(" 7 ")).unwrap(), 7);
        assert!(matches!(parse_link_id(None), Err(RedirectError::InvalidLink)));
        assert!(matches!(parse_link_id(Some("")), Err(RedirectError::InvalidLink)));
        assert!(matches!(parse_link_id(Some("abc")), Err(RedirectError::InvalidLink)));
    }

    #[test]
    fn test_outcome_locations() {
        assert_eq!(
            RedirectOutcome::Direct {
                url: "https://example.com/x".into()
            }
            .location(),
            "https://example.com/x"
        );
        assert_eq!(RedirectOutcome::Prelander { link_id: 3 }.location(), "/prelander?id=3");
        assert_eq!(
            RedirectOutcome::Fallback { token: "a.b".into() }.location(),
            "/fallback?token=a.b"
        );
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(RedirectError::InvalidLink.status(), StatusCode::BAD_REQUEST);
        assert_eq!(RedirectError::LinkNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            RedirectError::Internal(anyhow::anyhow!("boom")).to_string(),
            "An error occurred"
        );
    }
}
