use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use detour::api;
use detour::auth::AuthService;
use detour::config::{AuthMode, Config, DatabaseBackend};
use detour::geo::build_locator;
use detour::redirect::{self, RedirectState};
use detour::storage::{CachedStorage, PostgresStorage, SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("detour=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    let backend: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(
                SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage");
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections)
                    .await?,
            )
        }
    };

    info!("Initializing database...");
    backend.init().await?;
    info!("Database initialized successfully");

    let storage: Arc<dyn Storage> = Arc::new(CachedStorage::new(
        backend,
        config.cache.max_entries,
        config.cache.ttl_secs,
    ));

    let auth_service = Arc::new(AuthService::new(&config.auth));
    match auth_service.mode() {
        AuthMode::None => info!("🔓 Authentication is disabled - all API requests are allowed"),
        AuthMode::ApiKey => info!(
            "🔐 API key authentication enabled ({} key(s))",
            config.auth.api_keys.len()
        ),
    }

    let geo = build_locator(&config.geo)?;
    info!(provider = ?config.geo.provider, "Geolocation configured");

    let redirect_state = Arc::new(RedirectState::new(
        Arc::clone(&storage),
        geo,
        config.geo.clone(),
        &config.redirect,
    ));

    let api_router = api::create_api_router(Arc::clone(&storage), auth_service)
        .layer(TraceLayer::new_for_http());
    let redirect_router =
        redirect::create_redirect_router(redirect_state).layer(TraceLayer::new_for_http());

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 API server listening on http://{}", api_addr);
    info!("   - API endpoints available at http://{}/api/...", api_addr);

    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr).await?;
    info!("🚀 Redirect server listening on http://{}", redirect_addr);
    info!("   - Visitor links look like http://{}/go?id=<link>", redirect_addr);

    tokio::try_join!(
        axum::serve(
            api_listener,
            api_router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal()),
        axum::serve(
            redirect_listener,
            redirect_router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal()),
    )?;

    info!("Servers stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
