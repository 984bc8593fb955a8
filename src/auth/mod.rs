//! Admin API guard

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::config::{AuthConfig, AuthMode};

pub const API_KEY_HEADER: &str = "x-api-key";

pub struct AuthService {
    mode: AuthMode,
    api_keys: Arc<Vec<String>>,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            mode: config.mode,
            api_keys: Arc::new(config.api_keys.clone()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            mode: AuthMode::None,
            api_keys: Arc::new(Vec::new()),
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn validate_key(&self, key: &str) -> bool {
        match self.mode {
            AuthMode::None => true,
            AuthMode::ApiKey => {
                !key.is_empty()
                    && self
                        .api_keys
                        .iter()
                        .any(|k| bool::from(k.as_bytes().ct_eq(key.as_bytes())))
            }
        }
    }
}

#[derive(Serialize)]
struct UnauthorizedResponse {
    error: &'static str,
}

pub async fn auth_middleware(
    auth_service: Arc<AuthService>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if auth_service.validate_key(api_key) {
        next.run(request).await
    } else {
        tracing::debug!(path = %request.uri().path(), "rejected admin request without a valid API key");
        (
            StatusCode::UNAUTHORIZED,
            Json(UnauthorizedResponse {
                error: "Invalid or missing API key",
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_auth_allows_everything() {
        let auth = AuthService::disabled();
        assert!(auth.validate_key(""));
        assert!(auth.validate_key("anything"));
    }

    #[test]
    fn test_api_key_mode() {
        let auth = AuthService::new(&AuthConfig {
            mode: AuthMode::ApiKey,
            api_keys: vec!["alpha".to_string(), "beta".to_string()],
        });
        assert!(auth.validate_key("alpha"));
        assert!(auth.validate_key("beta"));
        assert!(!auth.validate_key("alph"));
        assert!(!auth.validate_key(""));
    }
}
