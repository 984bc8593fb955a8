//! Per-browser persistent state carried in cookies
//!
//! The session id and the rotation cursor are the only two keys. Concurrent
//! tabs can overwrite each other's cursor; that costs at most a skipped or
//! repeated candidate.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use std::collections::HashMap;

use crate::routing::RotationCursor;
use crate::tracking::{generate_session_id, is_session_id};

pub const SESSION_KEY: &str = "detour_session_id";
pub const CURSOR_KEY: &str = "detour_rotation_cursor";

/// Ten years; the values are meant to persist until cleared
const MAX_AGE_SECS: u64 = 315_360_000;

/// Flat string key-value store scoped to one browser
pub trait BrowserStorage {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: &str);
}

/// Browser storage read from the request `Cookie` header and written back as `Set-Cookie`
#[derive(Debug, Default)]
pub struct CookieStorage {
    values: HashMap<String, String>,
    writes: Vec<(String, String)>,
    secure: bool,
}

impl CookieStorage {
    pub fn from_headers(headers: &HeaderMap, secure: bool) -> Self {
        let mut values = HashMap::new();

        for header in headers.get_all(COOKIE) {
            let Ok(raw) = header.to_str() else {
                continue;
            };
            for pair in raw.split(';') {
                let Some((name, value)) = pair.split_once('=') else {
                    continue;
                };
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                // First occurrence wins, matching the most specific path
                values
                    .entry(name.to_string())
                    .or_insert_with(|| value.trim().trim_matches('"').to_string());
            }
        }

        Self {
            values,
            writes: Vec::new(),
            secure,
        }
    }

    /// `Set-Cookie` headers for every key written during this request
    pub fn into_headers(self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in self.writes {
            let mut cookie =
                format!("{name}={value}; Path=/; Max-Age={MAX_AGE_SECS}; SameSite=Lax; HttpOnly");
            if self.secure {
                cookie.push_str("; Secure");
            }
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(_) => tracing::warn!(cookie = %name, "dropping cookie with invalid characters"),
            }
        }
        headers
    }
}

fn is_cookie_value(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b.is_ascii_graphic() && !matches!(b, b'"' | b',' | b';' | b'\\'))
}

impl BrowserStorage for CookieStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) {
        if !is_cookie_value(value) {
            tracing::warn!(cookie = key, "refusing to store a value that is not cookie-safe");
            return;
        }
        self.values.insert(key.to_string(), value.to_string());
        self.writes.retain(|(name, _)| name != key);
        self.writes.push((key.to_string(), value.to_string()));
    }
}

pub fn load_cursor(storage: &impl BrowserStorage) -> RotationCursor {
    storage
        .get_item(CURSOR_KEY)
        .map(|raw| RotationCursor::parse(&raw))
        .unwrap_or_default()
}

pub fn store_cursor(storage: &mut impl BrowserStorage, cursor: RotationCursor) {
    storage.set_item(CURSOR_KEY, &cursor.to_string());
}

/// Reuse the browser's session id, creating and storing one on first visit
pub fn ensure_session_id(storage: &mut impl BrowserStorage) -> String {
    if let Some(existing) = storage.get_item(SESSION_KEY) {
        if is_session_id(&existing) {
            return existing;
        }
    }

    let session_id = generate_session_id();
    storage.set_item(SESSION_KEY, &session_id);
    session_id
}
