use thiserror::Error;

/// Failures surfaced by the catalog client.
///
/// Every variant carries a human-readable message; none of them is fatal to
/// the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The live-query channel failed; the catalog keeps its last good state.
    #[error("Catalog subscription failed: {0}")]
    Subscription(String),

    /// Icon upload failed; nothing was written.
    #[error("Image upload failed: {0}")]
    Upload(String),

    /// Creating or updating a record failed.
    #[error("Failed to save catalog entry: {0}")]
    Write(String),

    /// Deleting a record failed.
    #[error("Failed to delete catalog entry: {0}")]
    Delete(String),

    /// Best-effort icon removal failed. Logged, never returned from a delete.
    #[error("Failed to remove stored image: {0}")]
    StorageCleanup(String),

    #[error("Catalog entry not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
