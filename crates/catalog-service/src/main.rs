//! Catalog Service
//!
//! REST API for the app market admin console and storefront

use anyhow::{Context, Result};
use catalog_service::{
    blobs::LocalObjectStore, config::BackendKind, create_router, memory::InMemoryDocumentStore,
    storage::RedisDocumentStore, AppState, Config, DocumentStore, ObjectStore,
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Catalog Service");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Backend: {:?}", config.backend);
    info!("Icon directory: {}", config.icon_dir.display());

    config
        .ensure_directories()
        .context("Failed to create directories")?;

    // Initialize backends
    let documents: Arc<dyn DocumentStore> = match config.backend {
        BackendKind::Redis => {
            info!("Redis URL: {}", config.redis_url);
            Arc::new(
                RedisDocumentStore::new(&config.redis_url)
                    .await
                    .context("Failed to initialize storage")?,
            )
        }
        BackendKind::Memory => Arc::new(InMemoryDocumentStore::new()),
    };
    let objects: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(
        config.icon_dir.clone(),
        config.icon_base_url.clone(),
    ));

    // Create application state
    let state = AppState::connect(documents, objects).await;

    // Create router
    let app = create_router(state).nest_service("/icons", ServeDir::new(&config.icon_dir));

    // Bind and serve
    let addr = config.api_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Catalog Service running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received shutdown signal");
        })
        .await
        .context("Server error")?;

    Ok(())
}
