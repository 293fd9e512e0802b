//! App Market Catalog Service
//!
//! Admin console and public storefront for a catalog of downloadable apps.
//! The catalog itself lives in an external document store; this service keeps
//! a live in-memory copy per screen, derives views from it, and routes every
//! write through the mutation gateway.
//!
//! ## Components
//!
//! - `backend`: document store and object store interfaces
//! - `storage`: Redis document store with pub/sub live queries
//! - `blobs`: filesystem icon storage
//! - `memory`: in-memory backends for development and tests
//! - `store`: catalog store adapter fed by a live query
//! - `gateway`: create/update/feature/download/delete sequencing
//! - `handlers`: HTTP handlers for both screens
//! - `config`: configuration management

pub mod backend;
pub mod blobs;
pub mod config;
pub mod gateway;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod storage;
pub mod store;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use backend::{CatalogOrder, DocumentStore, ObjectStore};
pub use config::Config;
pub use gateway::{EntryForm, IconUpload, MutationGateway};
pub use handlers::AppState;
pub use store::{CatalogSnapshot, CatalogStore};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_handler))
        // Admin console
        .route(
            "/api/admin/apps",
            get(handlers::admin_list_handler).post(handlers::create_app_handler),
        )
        .route("/api/admin/stats", get(handlers::admin_stats_handler))
        .route(
            "/api/admin/apps/{id}",
            put(handlers::update_app_handler).delete(handlers::delete_app_handler),
        )
        .route(
            "/api/admin/apps/{id}/featured",
            post(handlers::toggle_featured_handler),
        )
        // Storefront
        .route("/api/apps", get(handlers::home_handler))
        .route("/api/apps/search", get(handlers::search_handler))
        .route(
            "/api/apps/category/{category}",
            get(handlers::category_handler),
        )
        .route("/api/apps/{id}", get(handlers::app_detail_handler))
        .route("/api/apps/{id}/download", post(handlers::download_handler))
        .with_state(shared_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
