//! API request handlers for the admin console and storefront

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use market_common::entry;
use market_common::views::{self, CategoryFilter, Pager};
use market_common::{CatalogEntry, CatalogError};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    backend::{CatalogOrder, DocumentStore, ObjectStore},
    gateway::{EntryForm, IconUpload, MutationGateway},
    models::{
        sync_note, ActionResponse, AdminListQuery, AdminListResponse, AdminRow, AppResponse,
        AppsListResponse, DownloadResponse, FeaturedRequest, HomeResponse, SearchQuery,
        StatsResponse,
    },
    store::CatalogStore,
};

/// Shared application state
///
/// The admin console and the storefront each hold their own live query, like
/// two independent screens would.
pub struct AppState {
    pub admin: MutationGateway,
    pub storefront: MutationGateway,
}

impl AppState {
    /// Open both live queries and wire up the gateways.
    ///
    /// A failing subscription is not fatal; the affected screen reports it on
    /// every listing until the backend recovers.
    pub async fn connect(documents: Arc<dyn DocumentStore>, objects: Arc<dyn ObjectStore>) -> Self {
        let admin_catalog = Arc::new(CatalogStore::new(CatalogOrder::NewestFirst));
        let storefront_catalog = Arc::new(CatalogStore::new(CatalogOrder::Unordered));

        for catalog in [&admin_catalog, &storefront_catalog] {
            if let Err(e) = catalog.connect(documents.as_ref()).await {
                warn!("Starting without live catalog: {}", e);
            }
        }

        Self {
            admin: MutationGateway::new(documents.clone(), objects.clone(), admin_catalog),
            storefront: MutationGateway::new(documents, objects, storefront_catalog),
        }
    }
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        let status = match err {
            CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: format!("Malformed form: {}", err.body_text()),
        }
    }
}

/// Read the admin form. An empty file input counts as no icon.
async fn read_form(mut multipart: Multipart) -> Result<(EntryForm, Option<IconUpload>), ApiError> {
    let mut form = EntryForm::default();
    let mut icon = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "icon" {
            let file_name = field.file_name().unwrap_or("icon").to_string();
            let bytes = field.bytes().await?;
            if !bytes.is_empty() {
                icon = Some(IconUpload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let value = field.text().await?;
        match name.as_str() {
            "name" => form.name = value,
            "category" => form.category = value,
            "description" => form.description = value,
            "downloadUrl" => form.download_url = value,
            "rating" => form.rating = entry::parse_rating(&value),
            "downloads" => form.downloads = entry::parse_count(&value),
            "featured" => form.featured = matches!(value.as_str(), "on" | "true"),
            other => debug!("Ignoring form field: {}", other),
        }
    }

    Ok((form, icon))
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "catalog-service"
    }))
}

// --- Admin console ---

/// Paginated, filtered admin table
pub async fn admin_list_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AdminListQuery>,
) -> Json<AdminListResponse> {
    let snapshot = state.admin.catalog().snapshot();

    let filter = CategoryFilter::from(query.category.as_deref().unwrap_or_default());
    let rows: Vec<AdminRow> = views::admin_filter(
        &snapshot.entries,
        query.q.as_deref().unwrap_or_default(),
        &filter,
    )
    .into_iter()
    .map(AdminRow::from)
    .collect();

    let page = Pager::default().paginate(&rows, query.page.unwrap_or(1));

    Json(AdminListResponse {
        page,
        catalog_size: snapshot.entries.len(),
        sync_error: sync_note(&snapshot.sync_error),
    })
}

/// Dashboard statistics
pub async fn admin_stats_handler(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let snapshot = state.admin.catalog().snapshot();

    Json(StatsResponse::new(
        views::dashboard(&snapshot.entries),
        sync_note(&snapshot.sync_error),
    ))
}

/// Create a catalog entry from the admin form
pub async fn create_app_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ActionResponse>, ApiError> {
    let (form, icon) = read_form(multipart).await?;
    info!("Creating catalog entry: {}", form.name);

    let id = state.admin.create(form, icon).await?;

    Ok(Json(ActionResponse {
        id: Some(id),
        ..ActionResponse::ok("App added")
    }))
}

/// Update a catalog entry from the admin form
pub async fn update_app_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<ActionResponse>, ApiError> {
    let (form, icon) = read_form(multipart).await?;
    info!("Updating catalog entry: {}", id);

    state.admin.update(&id, form, icon).await?;

    Ok(Json(ActionResponse {
        id: Some(id),
        ..ActionResponse::ok("App updated")
    }))
}

/// Set or clear the featured flag
pub async fn toggle_featured_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<FeaturedRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    state.admin.toggle_featured(&id, payload.featured).await?;

    let message = if payload.featured {
        "App marked as featured"
    } else {
        "App no longer featured"
    };
    Ok(Json(ActionResponse::ok(message)))
}

/// Delete a catalog entry and its icon
pub async fn delete_app_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    info!("Deleting catalog entry: {}", id);

    state.admin.delete(&id).await?;

    Ok(Json(ActionResponse::ok("App deleted")))
}

// --- Storefront ---

fn owned(entries: Vec<&CatalogEntry>) -> Vec<CatalogEntry> {
    entries.into_iter().cloned().collect()
}

/// Featured, newest and most downloaded shelves
pub async fn home_handler(State(state): State<Arc<AppState>>) -> Json<HomeResponse> {
    let snapshot = state.storefront.catalog().snapshot();

    Json(HomeResponse {
        featured: owned(views::featured(&snapshot.entries)),
        newest: owned(views::newest(&snapshot.entries)),
        top: owned(views::top_downloaded(&snapshot.entries)),
        sync_error: sync_note(&snapshot.sync_error),
    })
}

/// Search by name, description or category
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Json<AppsListResponse> {
    let snapshot = state.storefront.catalog().snapshot();

    Json(AppsListResponse::new(
        views::search(&snapshot.entries, &query.q),
        sync_note(&snapshot.sync_error),
    ))
}

/// Entries in one category, or all of them for `all`
pub async fn category_handler(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> Json<AppsListResponse> {
    let snapshot = state.storefront.catalog().snapshot();
    let filter = CategoryFilter::from(category.as_str());

    Json(AppsListResponse::new(
        views::by_category(&snapshot.entries, &filter),
        sync_note(&snapshot.sync_error),
    ))
}

/// Detail view of one entry
pub async fn app_detail_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AppResponse>, ApiError> {
    let app = state
        .storefront
        .catalog()
        .find(&id)
        .ok_or(CatalogError::NotFound(id))?;

    Ok(Json(AppResponse { app }))
}

/// Count a download and hand back the link
pub async fn download_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let downloads = state.storefront.increment_download(&id).await?;
    let entry = state
        .storefront
        .catalog()
        .find(&id)
        .ok_or_else(|| CatalogError::NotFound(id.clone()))?;

    Ok(Json(DownloadResponse {
        success: true,
        message: format!("Download of {} started", entry.name),
        downloads,
        download_url: entry.download_url,
    }))
}
