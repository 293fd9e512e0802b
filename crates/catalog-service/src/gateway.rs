//! Mutation gateway
//!
//! All writes go through here. Icons are uploaded before the record is
//! written, and deletes drop the record even when the icon cannot be removed.
//! Nothing is retried, and reads of current values (icon URL, download count)
//! come from the in-memory catalog, which may be stale.

use chrono::{DateTime, Utc};
use market_common::entry::{fields, format_timestamp};
use market_common::{CatalogError, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::{BackendError, DocumentStore, Fields, ObjectStore};
use crate::store::CatalogStore;

/// Object-store folder for uploaded icons.
pub const ICON_FOLDER: &str = "app-icons";

/// Values submitted from the admin form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryForm {
    pub name: String,
    pub category: String,
    pub description: String,
    pub download_url: String,
    pub rating: f64,
    pub downloads: u64,
    pub featured: bool,
}

impl EntryForm {
    fn to_fields(&self, updated_at: &str) -> Fields {
        let mut body = Fields::new();
        body.insert(fields::NAME.to_string(), json!(self.name));
        body.insert(fields::CATEGORY.to_string(), json!(self.category));
        body.insert(fields::DESCRIPTION.to_string(), json!(self.description));
        body.insert(fields::DOWNLOAD_URL.to_string(), json!(self.download_url));
        body.insert(fields::RATING.to_string(), json!(self.rating));
        body.insert(fields::DOWNLOADS.to_string(), json!(self.downloads));
        body.insert(fields::FEATURED.to_string(), json!(self.featured));
        body.insert(fields::UPDATED_AT.to_string(), json!(updated_at));
        body
    }
}

/// An icon file picked in the admin form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Object path for an icon uploaded at `at`: `app-icons/{millis}-{name}`.
///
/// Directory parts of the original file name are dropped.
pub fn icon_path(file_name: &str, at: DateTime<Utc>) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or("icon");

    format!("{}/{}-{}", ICON_FOLDER, at.timestamp_millis(), base)
}

fn write_error(id: &str, e: BackendError) -> CatalogError {
    match e {
        BackendError::NotFound(_) => CatalogError::NotFound(id.to_string()),
        other => CatalogError::Write(other.to_string()),
    }
}

pub struct MutationGateway {
    documents: Arc<dyn DocumentStore>,
    objects: Arc<dyn ObjectStore>,
    catalog: Arc<CatalogStore>,
}

impl MutationGateway {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        catalog: Arc<CatalogStore>,
    ) -> Self {
        Self {
            documents,
            objects,
            catalog,
        }
    }

    /// The catalog this gateway reads current values from.
    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    async fn upload_icon(&self, icon: IconUpload, at: DateTime<Utc>) -> Result<String> {
        let path = icon_path(&icon.file_name, at);

        let url = self
            .objects
            .upload(&path, icon.bytes)
            .await
            .map_err(|e| CatalogError::Upload(e.to_string()))?;

        info!("Uploaded icon to {}", url);
        Ok(url)
    }

    /// Create a new entry, uploading its icon first.
    ///
    /// Returns the backend-assigned id.
    pub async fn create(&self, form: EntryForm, icon: Option<IconUpload>) -> Result<String> {
        let now = Utc::now();
        let stamp = format_timestamp(now);

        let mut body = form.to_fields(&stamp);
        body.insert(fields::CREATED_AT.to_string(), json!(stamp));

        if let Some(icon) = icon.filter(|icon| !icon.bytes.is_empty()) {
            let url = self.upload_icon(icon, now).await?;
            body.insert(fields::ICON_URL.to_string(), Value::String(url));
        }

        let id = self
            .documents
            .create(body)
            .await
            .map_err(|e| CatalogError::Write(e.to_string()))?;

        info!("Created catalog entry {} ({})", id, form.name);
        Ok(id)
    }

    /// Overwrite an entry's form fields.
    ///
    /// Without a new icon the current in-memory icon URL is carried over.
    pub async fn update(&self, id: &str, form: EntryForm, icon: Option<IconUpload>) -> Result<()> {
        let now = Utc::now();
        let mut body = form.to_fields(&format_timestamp(now));

        match icon.filter(|icon| !icon.bytes.is_empty()) {
            Some(icon) => {
                let url = self.upload_icon(icon, now).await?;
                body.insert(fields::ICON_URL.to_string(), Value::String(url));
            }
            None => match self.catalog.find(id) {
                Some(current) => {
                    if let Some(url) = current.icon_url {
                        body.insert(fields::ICON_URL.to_string(), Value::String(url));
                    }
                }
                None => warn!("Entry {} not in local catalog, leaving icon unset", id),
            },
        }

        self.documents
            .update(id, body)
            .await
            .map_err(|e| write_error(id, e))?;

        info!("Updated catalog entry {}", id);
        Ok(())
    }

    /// Set or clear the featured flag. Last writer wins.
    pub async fn toggle_featured(&self, id: &str, featured: bool) -> Result<()> {
        let mut body = Fields::new();
        body.insert(fields::FEATURED.to_string(), json!(featured));
        body.insert(fields::UPDATED_AT.to_string(), json!(format_timestamp(Utc::now())));

        self.documents
            .update(id, body)
            .await
            .map_err(|e| write_error(id, e))?;

        info!("Set featured={} on catalog entry {}", featured, id);
        Ok(())
    }

    /// Count one download.
    ///
    /// Writes the in-memory count plus one, so two callers reading the same
    /// snapshot both write the same value and one increment is lost. The
    /// count saturates at `u64::MAX`.
    pub async fn increment_download(&self, id: &str) -> Result<u64> {
        let current = self
            .catalog
            .find(id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        let downloads = current.downloads.saturating_add(1);

        let mut body = Fields::new();
        body.insert(fields::DOWNLOADS.to_string(), json!(downloads));
        body.insert(fields::UPDATED_AT.to_string(), json!(format_timestamp(Utc::now())));

        self.documents
            .update(id, body)
            .await
            .map_err(|e| write_error(id, e))?;

        Ok(downloads)
    }

    /// Delete an entry and, best effort, its stored icon.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let icon_url = self.catalog.find(id).and_then(|entry| entry.icon_url);

        if let Some(url) = icon_url.filter(|url| self.objects.owns(url)) {
            if let Err(e) = self.objects.delete(&url).await {
                warn!("{}", CatalogError::StorageCleanup(format!("{}: {}", url, e)));
            }
        }

        self.documents
            .delete(id)
            .await
            .map_err(|e| CatalogError::Delete(e.to_string()))?;

        info!("Deleted catalog entry {}", id);
        Ok(())
    }
}
