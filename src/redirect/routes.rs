use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use super::fallback::{region_fallback, rotate};
use super::handlers::{go, go_path, health_check, RedirectState};
use super::middleware::record_request_start;
use super::prelander::{show_prelander, submit_prelander};

pub fn create_redirect_router(state: Arc<RedirectState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/go", get(go))
        .route("/go/{id}", get(go_path))
        .route("/fallback", get(region_fallback))
        .route("/rotate", get(rotate))
        .route("/prelander", get(show_prelander).post(submit_prelander))
        .layer(middleware::from_fn(record_request_start))
        .with_state(state)
}
