//! Minimal HTML for the visitor-facing terminal states
//!
//! Pages never include raw error text; admin-supplied content is escaped.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};

use crate::models::PrelanderConfig;

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body
    )
}

fn page(status: StatusCode, cookies: HeaderMap, html: String) -> Response {
    let mut headers = cookies;
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    (status, headers, Html(html)).into_response()
}

/// A short message and a way back to the site root
pub fn message_page(status: StatusCode, cookies: HeaderMap, message: &str) -> Response {
    let body = format!(
        "<main>\n<p>{}</p>\n<p><a href=\"/\">Return to homepage</a></p>\n</main>",
        escape_html(message)
    );
    page(status, cookies, document(message, &body))
}

pub const REGION_UNAVAILABLE: &str = "This content is not available in your region";

pub fn region_unavailable(cookies: HeaderMap) -> Response {
    message_page(StatusCode::OK, cookies, REGION_UNAVAILABLE)
}

/// Email capture form posting back to the same prelander
pub fn prelander_form(
    status: StatusCode,
    cookies: HeaderMap,
    prelander: &PrelanderConfig,
    error: Option<&str>,
) -> Response {
    let description = prelander
        .description
        .as_deref()
        .map(|d| format!("<p>{}</p>\n", escape_html(d)))
        .unwrap_or_default();
    let error = error
        .map(|e| format!("<p role=\"alert\">{}</p>\n", escape_html(e)))
        .unwrap_or_default();

    let body = format!(
        "<main>\n<h1>{headline}</h1>\n{description}{error}\
         <form method=\"post\" action=\"/prelander?id={link_id}\">\n\
         <input type=\"email\" name=\"email\" required placeholder=\"you@example.com\">\n\
         <button type=\"submit\">{button}</button>\n</form>\n</main>",
        headline = escape_html(&prelander.headline),
        link_id = prelander.link_id,
        button = escape_html(&prelander.button_text),
    );

    page(status, cookies, document(&prelander.headline, &body))
}
