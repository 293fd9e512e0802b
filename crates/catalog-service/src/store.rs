//! Catalog store adapter
//!
//! Owns the in-memory catalog list for one screen. Each push from the live
//! query replaces the list wholesale; a failed push only records the error so
//! readers keep seeing the last good catalog.

use chrono::Utc;
use market_common::{CatalogEntry, CatalogError};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::backend::{BackendError, CatalogOrder, DocumentStore, Push, Subscription};

/// Consistent view of the catalog at one point in time.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    /// Normalized entries in live-query order
    pub entries: Arc<Vec<CatalogEntry>>,

    /// Set while the live query is failing
    pub sync_error: Option<CatalogError>,

    /// Number of successful pushes applied so far
    pub revision: u64,
}

impl CatalogSnapshot {
    pub fn find(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }
}

pub struct CatalogStore {
    order: CatalogOrder,
    state: watch::Sender<CatalogSnapshot>,
}

impl CatalogStore {
    pub fn new(order: CatalogOrder) -> Self {
        let (state, _) = watch::channel(CatalogSnapshot::default());
        Self { order, state }
    }

    pub fn order(&self) -> CatalogOrder {
        self.order
    }

    /// Apply one delivery from the live query.
    pub fn apply_push(&self, push: Push) {
        match push {
            Ok(records) => {
                let now = Utc::now();
                let entries: Vec<CatalogEntry> = records
                    .iter()
                    .map(|record| CatalogEntry::normalize(record, now))
                    .collect();

                debug!("Catalog refreshed with {} entries", entries.len());

                self.state.send_modify(|snapshot| {
                    snapshot.entries = Arc::new(entries);
                    snapshot.sync_error = None;
                    snapshot.revision += 1;
                });
            }
            Err(e) => {
                let failure = CatalogError::Subscription(e.to_string());
                error!("{}", failure);

                self.state.send_modify(|snapshot| {
                    snapshot.sync_error = Some(failure);
                });
            }
        }
    }

    /// Pump a live query into this store until the backend closes it.
    pub fn attach(self: &Arc<Self>, mut subscription: Subscription) -> JoinHandle<()> {
        let store = Arc::clone(self);

        tokio::spawn(async move {
            while let Some(push) = subscription.recv().await {
                store.apply_push(push);
            }

            warn!("Catalog live query ended");
            store.apply_push(Err(BackendError::Closed));
        })
    }

    /// Open the live query on `documents` and attach to it.
    ///
    /// A failure to subscribe is recorded on the store as well as returned.
    pub async fn connect(
        self: &Arc<Self>,
        documents: &dyn DocumentStore,
    ) -> Result<JoinHandle<()>, CatalogError> {
        match documents.subscribe(self.order).await {
            Ok(subscription) => Ok(self.attach(subscription)),
            Err(e) => {
                let message = e.to_string();
                self.apply_push(Err(e));
                Err(CatalogError::Subscription(message))
            }
        }
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        self.state.borrow().clone()
    }

    /// Register for change notifications.
    pub fn watch(&self) -> watch::Receiver<CatalogSnapshot> {
        self.state.subscribe()
    }

    /// Entry with `id` in the current snapshot.
    pub fn find(&self, id: &str) -> Option<CatalogEntry> {
        self.state.borrow().find(id).cloned()
    }
}
