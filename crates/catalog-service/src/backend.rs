//! Backend client interfaces
//!
//! The catalog talks to two external collaborators: a document store holding
//! the `apps` collection and an object store holding uploaded icons. Both are
//! traits so the service can run against Redis and the local filesystem in
//! production and against in-memory doubles in tests.

use async_trait::async_trait;
use market_common::entry::fields;
use market_common::RawRecord;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Object URL is not managed by this store: {0}")]
    ForeignUrl(String),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("Subscription channel closed")]
    Closed,

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Document body or partial update, keyed by persisted field name.
pub type Fields = Map<String, Value>;

/// One delivery on a live query: the full current result set, or the failure.
pub type Push = BackendResult<Vec<RawRecord>>;

/// Receiving half of a live query.
pub type Subscription = mpsc::UnboundedReceiver<Push>;

/// Ordering requested for a live query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogOrder {
    /// Backend order; the storefront sorts on its own
    #[default]
    Unordered,
    /// `createdAt` descending, used by the admin table
    NewestFirst,
}

/// Document database holding the `apps` collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Open a live query over the whole collection.
    ///
    /// The current result set is delivered right away and again after every
    /// change.
    async fn subscribe(&self, order: CatalogOrder) -> BackendResult<Subscription>;

    /// Insert a new document and return its backend-assigned id.
    async fn create(&self, fields: Fields) -> BackendResult<String>;

    /// Merge `fields` into an existing document.
    async fn update(&self, id: &str, fields: Fields) -> BackendResult<()>;

    /// Remove a document. Removing a missing document is not an error.
    async fn delete(&self, id: &str) -> BackendResult<()>;
}

/// Blob storage for uploaded icons.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `path` and return a publicly fetchable URL.
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> BackendResult<String>;

    /// Whether `url` points into this store.
    fn owns(&self, url: &str) -> bool;

    /// Delete the object behind a URL previously returned by `upload`.
    async fn delete(&self, url: &str) -> BackendResult<()>;
}

/// Public URL for an object stored at `path` under `base_url`.
///
/// Each path segment is percent-encoded so names containing `#`, `?` or
/// spaces stay fetchable.
pub fn object_url(base_url: &str, path: &str) -> String {
    let encoded: Vec<String> = path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();

    format!("{}/{}", base_url, encoded.join("/"))
}

/// Object path behind a URL built by [`object_url`], or `None` when the URL
/// points elsewhere.
pub fn object_path(base_url: &str, url: &str) -> Option<String> {
    let rest = url.strip_prefix(base_url)?.strip_prefix('/')?;

    urlencoding::decode(rest).ok().map(|path| path.into_owned())
}

/// Apply a live query's ordering to a freshly read result set.
///
/// Documents without `createdAt` sort last.
pub fn order_records(records: &mut [RawRecord], order: CatalogOrder) {
    if order == CatalogOrder::Unordered {
        return;
    }

    records.sort_by(|a, b| {
        let a = a.fields.get(fields::CREATED_AT).and_then(Value::as_str);
        let b = b.fields.get(fields::CREATED_AT).and_then(Value::as_str);
        match (a, b) {
            (Some(a), Some(b)) => b.cmp(a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}
