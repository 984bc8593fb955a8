use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{
        header::{CACHE_CONTROL, LOCATION, REFERER, USER_AGENT},
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use super::browser::{ensure_session_id, CookieStorage};
use super::flow::{resolve, RedirectError, Visit};
use super::middleware::RequestStart;
use crate::config::{GeoConfig, RedirectConfig};
use crate::geo::{extract_client_ip, GeoLocator};
use crate::storage::Storage;
use crate::token::TokenSigner;
use crate::tracking::{detect_device_type, ClickTracker};

pub struct RedirectState {
    pub storage: Arc<dyn Storage>,
    pub geo: Arc<dyn GeoLocator>,
    pub geo_config: GeoConfig,
    pub tracker: ClickTracker,
    pub tokens: TokenSigner,
    pub secure_cookies: bool,
}

impl RedirectState {
    pub fn new(
        storage: Arc<dyn Storage>,
        geo: Arc<dyn GeoLocator>,
        geo_config: GeoConfig,
        redirect_config: &RedirectConfig,
    ) -> Self {
        Self {
            tracker: ClickTracker::new(Arc::clone(&storage), redirect_config.tracking_timeout_ms),
            tokens: TokenSigner::new(
                redirect_config.token_secret.as_deref(),
                redirect_config.token_ttl_secs,
            ),
            storage,
            geo,
            geo_config,
            secure_cookies: redirect_config.secure_cookies,
        }
    }

    pub(crate) fn browser(&self, headers: &HeaderMap) -> CookieStorage {
        CookieStorage::from_headers(headers, self.secure_cookies)
    }

    pub(crate) fn visit(&self, headers: &HeaderMap, addr: SocketAddr, session_id: String) -> Visit {
        let header_text = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
                .filter(|s| !s.is_empty())
        };
        let user_agent = header_text(USER_AGENT);

        Visit {
            client_ip: extract_client_ip(headers, addr.ip(), &self.geo_config),
            session_id,
            device_type: detect_device_type(user_agent.as_deref()),
            user_agent,
            referrer: header_text(REFERER),
        }
    }
}

/// Full-page navigation carrying the cookies written during the request
pub(crate) fn navigate(location: &str, cookies: HeaderMap) -> Response {
    let Ok(location_value) = HeaderValue::from_str(location) else {
        return RedirectError::Internal(anyhow::anyhow!("destination is not a valid header value"))
            .into_page(cookies);
    };

    let mut headers = cookies;
    headers.insert(LOCATION, location_value);
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    (StatusCode::SEE_OTHER, headers).into_response()
}

#[derive(Debug, Deserialize)]
pub struct LinkQuery {
    pub id: Option<String>,
}

/// `GET /go?id=<link>`
pub async fn go(
    State(state): State<Arc<RedirectState>>,
    Query(query): Query<LinkQuery>,
    Extension(RequestStart(request_start)): Extension<RequestStart>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    handle_go(&state, query.id.as_deref(), request_start, addr, &headers).await
}

/// `GET /go/<link>`
pub async fn go_path(
    State(state): State<Arc<RedirectState>>,
    Path(id): Path<String>,
    Extension(RequestStart(request_start)): Extension<RequestStart>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    handle_go(&state, Some(&id), request_start, addr, &headers).await
}

async fn handle_go(
    state: &RedirectState,
    raw_link_id: Option<&str>,
    request_start: std::time::Instant,
    addr: SocketAddr,
    headers: &HeaderMap,
) -> Response {
    let mut browser = state.browser(headers);
    let session_id = ensure_session_id(&mut browser);
    let visit = state.visit(headers, addr, session_id);

    let result = resolve(state, raw_link_id, &visit).await;
    let cookies = browser.into_headers();

    let mut response = match result {
        Ok(outcome) => navigate(&outcome.location(), cookies),
        Err(err) => err.into_page(cookies),
    };

    let elapsed_ms = request_start.elapsed().as_millis().to_string();
    if let Ok(value) = HeaderValue::from_str(&elapsed_ms) {
        response
            .headers_mut()
            .insert("x-detour-timing-total-ms", value);
    }
    response
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
