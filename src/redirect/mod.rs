//! Visitor-facing redirect server

pub mod browser;
pub mod fallback;
pub mod flow;
pub mod handlers;
pub mod middleware;
pub mod pages;
pub mod prelander;
pub mod routes;

pub use handlers::RedirectState;
pub use routes::create_redirect_router;
