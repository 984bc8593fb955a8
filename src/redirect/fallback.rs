//! Region fallback and the rotation pool
//!
//! `/fallback` is where `/go` sends visitors whose country the target link
//! does not allow. `/rotate` is the direct entry to the rotation pool used by
//! teaser pages. Both end in one navigation or the region-unavailable page.

use axum::{
    extract::{ConnectInfo, Query, State},
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

use super::browser::{ensure_session_id, load_cursor, store_cursor, CookieStorage};
use super::flow::RedirectError;
use super::handlers::{navigate, RedirectState};
use super::pages;
use crate::geo::Geolocation;
use crate::models::SessionVisit;
use crate::routing::next_candidate;

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// `GET /fallback?token=<signed token>`
pub async fn region_fallback(
    State(state): State<Arc<RedirectState>>,
    Query(query): Query<TokenQuery>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let mut browser = state.browser(&headers);
    let session_id = ensure_session_id(&mut browser);

    let Some(token) = query.token.as_deref().filter(|t| !t.is_empty()) else {
        return RedirectError::InvalidLink.into_page(browser.into_headers());
    };
    let claims = match state.tokens.verify(token) {
        Ok(claims) => claims,
        Err(err) => {
            debug!(error = %err, "rejected fallback token");
            return RedirectError::InvalidLink.into_page(browser.into_headers());
        }
    };

    let visit = state.visit(&headers, addr, session_id);
    state
        .tracker
        .record_visit(SessionVisit {
            session_id: visit.session_id,
            device_type: visit.device_type,
            country: Some(claims.country.clone()).filter(|c| !c.trim().is_empty()),
        })
        .await;

    match state.storage.get_link(claims.link_id).await {
        Ok(Some(link)) => {
            if let Some(fallback_link) = link.fallback_link.as_deref() {
                debug!(link_id = link.id, "using the link's own fallback destination");
                return navigate(fallback_link, browser.into_headers());
            }
        }
        // The pool still serves visitors whose link was removed after the token was issued
        Ok(None) => debug!(link_id = claims.link_id, "fallback token for a deleted link"),
        Err(err) => return RedirectError::Internal(err).into_page(browser.into_headers()),
    }

    serve_rotation(&state, &claims.country, browser).await
}

/// `GET /rotate`
pub async fn rotate(
    State(state): State<Arc<RedirectState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let mut browser = state.browser(&headers);
    let session_id = ensure_session_id(&mut browser);
    let visit = state.visit(&headers, addr, session_id);

    let geo: Geolocation = state.geo.locate(visit.client_ip).await;
    state
        .tracker
        .record_visit(SessionVisit {
            session_id: visit.session_id,
            device_type: visit.device_type,
            country: geo.country_opt(),
        })
        .await;

    serve_rotation(&state, &geo.country, browser).await
}

/// Advance this browser's cursor through the active pool and navigate
async fn serve_rotation(state: &RedirectState, country: &str, mut browser: CookieStorage) -> Response {
    let pool = match state.storage.list_candidates(true).await {
        Ok(pool) => pool,
        Err(err) => return RedirectError::Internal(err).into_page(browser.into_headers()),
    };

    let cursor = load_cursor(&browser);
    let rotation = next_candidate(&pool, country, cursor);

    match rotation.next {
        Some(candidate) => {
            debug!(
                candidate_id = candidate.id,
                %cursor,
                next_index = %rotation.next_index,
                country,
                "rotated to fallback candidate"
            );
            let url = candidate.url.clone();
            store_cursor(&mut browser, rotation.next_index);
            navigate(&url, browser.into_headers())
        }
        None => {
            info!(country, pool_size = pool.len(), "no fallback candidate allowed for visitor");
            pages::region_unavailable(browser.into_headers())
        }
    }
}
