use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::{self, Next},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::{auth_middleware, AuthService};
use crate::storage::Storage;

use super::fallbacks::{
    create_candidate, delete_candidate, get_candidate, list_candidates, preview_rotation,
    update_candidate,
};
use super::handlers::{
    create_link, delete_link, delete_prelander, get_link, get_prelander, get_session,
    health_check, list_clicks, list_leads, list_link_clicks, list_links, put_prelander,
    update_link, AppState,
};

pub fn create_api_router(storage: Arc<dyn Storage>, auth_service: Arc<AuthService>) -> Router {
    let state = Arc::new(AppState { storage });

    let protected_routes = Router::new()
        .route("/links", get(list_links).post(create_link))
        .route(
            "/links/{id}",
            get(get_link).put(update_link).delete(delete_link),
        )
        .route(
            "/links/{id}/prelander",
            get(get_prelander).put(put_prelander).delete(delete_prelander),
        )
        .route("/links/{id}/leads", get(list_leads))
        .route("/links/{id}/clicks", get(list_link_clicks))
        .route("/clicks", get(list_clicks))
        .route("/fallbacks", get(list_candidates).post(create_candidate))
        .route("/fallbacks/preview", get(preview_rotation))
        .route(
            "/fallbacks/{id}",
            get(get_candidate)
                .put(update_candidate)
                .delete(delete_candidate),
        )
        .route("/sessions/{id}", get(get_session))
        .route_layer(middleware::from_fn(
            move |headers: HeaderMap, req: Request, next: Next| {
                let auth = Arc::clone(&auth_service);
                auth_middleware(auth, headers, req, next)
            },
        ));

    let api = Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new().nest("/api", api).layer(cors)
}
