//! Request and response bodies for the catalog API

use market_common::views::{DashboardStats, Page, SUMMARY_CHARS};
use market_common::{CatalogEntry, CatalogError};
use serde::{Deserialize, Serialize};

/// Admin table query: `?page=2&q=chess&category=games`
#[derive(Debug, Default, Deserialize)]
pub struct AdminListQuery {
    pub page: Option<usize>,
    pub q: Option<String>,
    pub category: Option<String>,
}

/// Storefront search query: `?q=...`
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Request to set or clear the featured flag
#[derive(Debug, Deserialize)]
pub struct FeaturedRequest {
    pub featured: bool,
}

/// One row of the admin table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminRow {
    #[serde(flatten)]
    pub entry: CatalogEntry,

    /// Description cut for the table
    pub summary: String,
}

impl From<&CatalogEntry> for AdminRow {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            summary: entry.summary(SUMMARY_CHARS),
            entry: entry.clone(),
        }
    }
}

/// Paginated admin table
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminListResponse {
    #[serde(flatten)]
    pub page: Page<AdminRow>,

    /// Size of the unfiltered catalog
    pub catalog_size: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_error: Option<String>,
}

/// Admin dashboard figures
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_apps: usize,
    pub total_downloads: u64,
    pub average_rating: f64,
    pub recent: Vec<CatalogEntry>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_error: Option<String>,
}

impl StatsResponse {
    pub fn new(stats: DashboardStats<'_>, sync_error: Option<String>) -> Self {
        Self {
            total_apps: stats.total_apps,
            total_downloads: stats.total_downloads,
            average_rating: stats.average_rating,
            recent: stats.recent.into_iter().cloned().collect(),
            sync_error,
        }
    }
}

/// Storefront landing page shelves
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeResponse {
    pub featured: Vec<CatalogEntry>,
    pub newest: Vec<CatalogEntry>,
    pub top: Vec<CatalogEntry>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_error: Option<String>,
}

/// Search or category results
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppsListResponse {
    pub apps: Vec<CatalogEntry>,
    pub total: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_error: Option<String>,
}

impl AppsListResponse {
    pub fn new(apps: Vec<&CatalogEntry>, sync_error: Option<String>) -> Self {
        let apps: Vec<CatalogEntry> = apps.into_iter().cloned().collect();
        Self {
            total: apps.len(),
            apps,
            sync_error,
        }
    }
}

/// Single entry for the detail view
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppResponse {
    pub app: CatalogEntry,
}

/// Outcome of an admin mutation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            id: None,
        }
    }
}

/// Outcome of a storefront download
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub success: bool,
    pub message: String,
    pub downloads: u64,
    pub download_url: String,
}

/// Render a store's sync failure for a listing response.
pub fn sync_note(error: &Option<CatalogError>) -> Option<String> {
    error.as_ref().map(ToString::to_string)
}
