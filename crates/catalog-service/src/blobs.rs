//! Filesystem-backed icon storage
//!
//! Objects are written under a root directory and served over HTTP by the
//! service itself, so their public URL is `base_url` joined with the object
//! path, percent-encoded.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::backend::{object_path, object_url, BackendError, BackendResult, ObjectStore};

/// Object store rooted at a local directory.
pub struct LocalObjectStore {
    root: PathBuf,
    base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        let root = root.into();
        let base_url = base_url.into().trim_end_matches('/').to_string();

        info!("Storing icons in {} (served at {})", root.display(), base_url);

        Self { root, base_url }
    }

    /// Map an object path onto the filesystem, refusing anything that would
    /// escape the root.
    fn resolve(&self, path: &str) -> BackendResult<PathBuf> {
        let relative = Path::new(path);
        let clean = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

        if path.is_empty() || !clean {
            return Err(BackendError::InvalidPath(path.to_string()));
        }

        Ok(self.root.join(relative))
    }

    fn path_of(&self, url: &str) -> Option<String> {
        object_path(&self.base_url, url)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> BackendResult<String> {
        let target = self.resolve(path)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &bytes).await?;

        debug!("Stored {} bytes at {}", bytes.len(), target.display());
        Ok(object_url(&self.base_url, path))
    }

    fn owns(&self, url: &str) -> bool {
        self.path_of(url).is_some()
    }

    async fn delete(&self, url: &str) -> BackendResult<()> {
        let path = self
            .path_of(url)
            .ok_or_else(|| BackendError::ForeignUrl(url.to_string()))?;
        let target = self.resolve(&path)?;

        tokio::fs::remove_file(&target).await?;

        debug!("Removed {}", target.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost:8090/icons/");

        let url = store
            .upload("app-icons/1700000000000-chess.png", b"png".to_vec())
            .await
            .unwrap();

        assert_eq!(
            url,
            "http://localhost:8090/icons/app-icons/1700000000000-chess.png"
        );
        let on_disk = dir.path().join("app-icons/1700000000000-chess.png");
        assert_eq!(std::fs::read(&on_disk).unwrap(), b"png");

        assert!(store.owns(&url));
        store.delete(&url).await.unwrap();
        assert!(!on_disk.exists());
    }

    #[tokio::test]
    async fn test_special_characters_stay_fetchable() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost:8090/icons");

        let url = store
            .upload("app-icons/1-my#1.png", b"png".to_vec())
            .await
            .unwrap();

        assert_eq!(url, "http://localhost:8090/icons/app-icons/1-my%231.png");
        let on_disk = dir.path().join("app-icons/1-my#1.png");
        assert!(on_disk.exists());

        store.delete(&url).await.unwrap();
        assert!(!on_disk.exists());
    }

    #[tokio::test]
    async fn test_rejects_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost/icons");

        let result = store.upload("../escape.png", vec![0]).await;
        assert!(matches!(result, Err(BackendError::InvalidPath(_))));

        let result = store.upload("/etc/passwd", vec![0]).await;
        assert!(matches!(result, Err(BackendError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_foreign_urls_are_not_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost/icons");

        assert!(!store.owns("https://cdn.example.com/icon.png"));
        let result = store.delete("https://cdn.example.com/icon.png").await;
        assert!(matches!(result, Err(BackendError::ForeignUrl(_))));
    }
}
