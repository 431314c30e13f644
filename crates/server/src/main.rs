//! Relaypix server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use relaypix_api::{AppState, router as api_router};
use relaypix_common::Config;
use relaypix_core::{CatalogService, DedupService, FolderService, RelayStore, TelegramRelay};
use relaypix_db::repositories::{AccessLogRepository, ImageRepository};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relaypix=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting relaypix server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = relaypix_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    relaypix_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let db = Arc::new(db);
    let image_repo = ImageRepository::new(Arc::clone(&db));
    let log_repo = AccessLogRepository::new(Arc::clone(&db));

    // Relay client
    let relay: Arc<dyn RelayStore> = Arc::new(TelegramRelay::new(
        config.relay.api_base.clone(),
        config.relay.bot_token.clone(),
        config.relay.chat_id.clone(),
    ));

    // Initialize services
    let catalog_service =
        CatalogService::new(image_repo.clone(), log_repo, Arc::clone(&relay));
    let folder_service = FolderService::new(image_repo.clone());
    let dedup_service = DedupService::new(image_repo, relay);

    // Sweep expired rows once at startup; dedup runs only when triggered.
    if let Err(e) = catalog_service.cleanup_expired().await {
        tracing::warn!(error = %e, "Expired-image cleanup failed");
    }

    // Create app state
    let state = AppState {
        catalog_service,
        folder_service,
        dedup_service,
    };

    // Build router
    let app = axum::Router::new()
        .nest("/api", api_router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
