//! In-memory backends for development and testing
//!
//! Behave like the managed backends (live queries push the full result set
//! after every change) without any network. Both stores can be told to fail
//! so tests can exercise the error paths of the mutation gateway.

use async_trait::async_trait;
use market_common::RawRecord;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::backend::{
    object_path, object_url, order_records, BackendError, BackendResult, CatalogOrder, DocumentStore, Fields, ObjectStore,
    Push, Subscription,
};

struct Watcher {
    order: CatalogOrder,
    tx: mpsc::UnboundedSender<Push>,
}

#[derive(Default)]
struct Documents {
    docs: BTreeMap<String, Fields>,
    watchers: Vec<Watcher>,
}

impl Documents {
    fn result_set(&self, order: CatalogOrder) -> Vec<RawRecord> {
        let mut records: Vec<RawRecord> = self
            .docs
            .iter()
            .map(|(id, fields)| RawRecord::new(id.clone(), fields.clone()))
            .collect();
        order_records(&mut records, order);
        records
    }

    /// Push the current result set to every live query, dropping closed ones.
    fn notify(&mut self) {
        let mut watchers = std::mem::take(&mut self.watchers);
        watchers.retain(|w| w.tx.send(Ok(self.result_set(w.order))).is_ok());
        self.watchers = watchers;
    }
}

/// Document store kept in a `BTreeMap`.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    inner: Mutex<Documents>,
    fail_writes: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = RawRecord>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state();
            for record in records {
                state.docs.insert(record.id, record.fields);
            }
        }
        store
    }

    fn state(&self) -> MutexGuard<'_, Documents> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or replace a document as if another client had written it.
    pub fn insert(&self, record: RawRecord) {
        let mut state = self.state();
        state.docs.insert(record.id, record.fields);
        state.notify();
    }

    /// Current body of a document.
    pub fn get(&self, id: &str) -> Option<Fields> {
        self.state().docs.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every create/update/delete fail until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Deliver a transport failure to every live query.
    pub fn break_subscriptions(&self, reason: &str) {
        let mut state = self.state();
        state
            .watchers
            .retain(|w| w.tx.send(Err(BackendError::Unavailable(reason.to_string()))).is_ok());
    }

    fn check_writable(&self) -> BackendResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn subscribe(&self, order: CatalogOrder) -> BackendResult<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.state();
        // Receiver is still in hand, so this send cannot fail.
        let _ = tx.send(Ok(state.result_set(order)));
        state.watchers.push(Watcher { order, tx });

        debug!("Opened in-memory live query ({:?})", order);
        Ok(rx)
    }

    async fn create(&self, fields: Fields) -> BackendResult<String> {
        self.check_writable()?;

        let id = Uuid::new_v4().simple().to_string();
        let mut state = self.state();
        state.docs.insert(id.clone(), fields);
        state.notify();

        Ok(id)
    }

    async fn update(&self, id: &str, fields: Fields) -> BackendResult<()> {
        self.check_writable()?;

        let mut state = self.state();
        let doc = state
            .docs
            .get_mut(id)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
        doc.extend(fields);
        state.notify();

        Ok(())
    }

    async fn delete(&self, id: &str) -> BackendResult<()> {
        self.check_writable()?;

        let mut state = self.state();
        if state.docs.remove(id).is_some() {
            state.notify();
        }

        Ok(())
    }
}

/// Object store kept in a `HashMap`, handing out URLs under `base_url`.
pub struct InMemoryObjectStore {
    base_url: String,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_uploads: AtomicBool,
    fail_deletes: AtomicBool,
    delete_calls: AtomicUsize,
}

impl InMemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Mutex::new(HashMap::new()),
            fail_uploads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            delete_calls: AtomicUsize::new(0),
        }
    }

    fn objects(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn path_of(&self, url: &str) -> Option<String> {
        object_path(&self.base_url, url)
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Whether the object behind `url` is still stored.
    pub fn contains(&self, url: &str) -> bool {
        self.path_of(url)
            .is_some_and(|path| self.objects().contains_key(&path))
    }

    /// Number of `delete` calls made so far, failed ones included.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> BackendResult<String> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("uploads disabled".to_string()));
        }

        self.objects().insert(path.to_string(), bytes);
        Ok(object_url(&self.base_url, path))
    }

    fn owns(&self, url: &str) -> bool {
        self.path_of(url).is_some()
    }

    async fn delete(&self, url: &str) -> BackendResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("deletes disabled".to_string()));
        }

        let path = self
            .path_of(url)
            .ok_or_else(|| BackendError::ForeignUrl(url.to_string()))?;

        match self.objects().remove(&path) {
            Some(_) => Ok(()),
            None => Err(BackendError::NotFound(url.to_string())),
        }
    }
}
