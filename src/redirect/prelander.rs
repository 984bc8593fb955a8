//! Email-capture interstitial in front of a target link

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Form,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::browser::ensure_session_id;
use super::flow::{parse_link_id, RedirectError};
use super::handlers::{navigate, LinkQuery, RedirectState};
use super::pages;
use crate::models::{NewLead, PrelanderConfig, TargetLink};

#[derive(Debug, Deserialize)]
pub struct LeadForm {
    #[serde(default)]
    pub email: String,
}

/// Loose address check: one `@`, a local part, and a dotted domain
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

async fn load(
    state: &RedirectState,
    raw_link_id: Option<&str>,
) -> Result<(TargetLink, Option<PrelanderConfig>), RedirectError> {
    let link_id = parse_link_id(raw_link_id)?;
    let (link, prelander) = tokio::join!(
        state.storage.get_link(link_id),
        state.storage.get_prelander_for_link(link_id),
    );

    let link = link
        .map_err(RedirectError::Internal)?
        .ok_or(RedirectError::LinkNotFound)?;
    let prelander = prelander
        .map_err(RedirectError::Internal)?
        .filter(|p| p.is_enabled);
    Ok((link, prelander))
}

/// `GET /prelander?id=<link>`
pub async fn show_prelander(
    State(state): State<Arc<RedirectState>>,
    Query(query): Query<LinkQuery>,
    headers: HeaderMap,
) -> Response {
    let mut browser = state.browser(&headers);
    ensure_session_id(&mut browser);

    match load(&state, query.id.as_deref()).await {
        Ok((_, Some(prelander))) => {
            pages::prelander_form(StatusCode::OK, browser.into_headers(), &prelander, None)
        }
        Ok((link, None)) => navigate(&link.original_link, browser.into_headers()),
        Err(err) => err.into_page(browser.into_headers()),
    }
}

/// `POST /prelander?id=<link>` with form field `email`
pub async fn submit_prelander(
    State(state): State<Arc<RedirectState>>,
    Query(query): Query<LinkQuery>,
    headers: HeaderMap,
    Form(form): Form<LeadForm>,
) -> Response {
    let mut browser = state.browser(&headers);
    let session_id = ensure_session_id(&mut browser);

    let (link, prelander) = match load(&state, query.id.as_deref()).await {
        Ok((link, Some(prelander))) => (link, prelander),
        Ok((link, None)) => return navigate(&link.original_link, browser.into_headers()),
        Err(err) => return err.into_page(browser.into_headers()),
    };

    let email = form.email.trim().to_string();
    if !is_valid_email(&email) {
        return pages::prelander_form(
            StatusCode::UNPROCESSABLE_ENTITY,
            browser.into_headers(),
            &prelander,
            Some("Please enter a valid email address"),
        );
    }

    let lead = NewLead {
        link_id: link.id,
        prelander_id: prelander.id,
        email,
        session_id: Some(session_id),
    };
    match state.storage.insert_lead(&lead).await {
        Ok(saved) => info!(link_id = link.id, lead_id = saved.id, "captured prelander lead"),
        Err(err) => warn!(link_id = link.id, error = %err, "failed to store prelander lead"),
    }

    navigate(&link.original_link, browser.into_headers())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("someone@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign.example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("someone@localhost"));
        assert!(!is_valid_email("someone@.example"));
        assert!(!is_valid_email("some one@example.com"));
        assert!(!is_valid_email("a@b@example.com"));
    }
}
