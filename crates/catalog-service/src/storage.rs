//! Redis-backed document store for the `apps` collection
//!
//! Documents live as JSON at `app:{id}`, ids are indexed in the `apps:all`
//! set, and every write publishes the changed id on `apps:changed`. Live
//! queries listen on that channel and re-read the whole collection per
//! notification.

use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use market_common::RawRecord;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{
    order_records, BackendError, BackendResult, CatalogOrder, DocumentStore, Fields, Subscription,
};

const INDEX_KEY: &str = "apps:all";
const CHANGES_CHANNEL: &str = "apps:changed";

fn document_key(id: &str) -> String {
    format!("app:{}", id)
}

/// Document store backed by Redis
pub struct RedisDocumentStore {
    client: redis::Client,
    conn: ConnectionManager,
}

impl RedisDocumentStore {
    /// Create a new storage instance
    pub async fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)
            .context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client.clone())
            .await
            .context("Failed to connect to Redis")?;

        info!("Connected to Redis at {}", redis_url);

        Ok(Self { client, conn })
    }

    async fn read_document(conn: &mut ConnectionManager, id: &str) -> BackendResult<Option<Fields>> {
        let json: Option<String> = conn.get(document_key(id)).await?;

        match json {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    /// Read the whole collection in the requested order
    async fn read_all(conn: &mut ConnectionManager, order: CatalogOrder) -> BackendResult<Vec<RawRecord>> {
        let ids: Vec<String> = conn.smembers(INDEX_KEY).await?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            // Deleted between SMEMBERS and GET
            if let Some(fields) = Self::read_document(conn, &id).await? {
                records.push(RawRecord::new(id, fields));
            }
        }

        order_records(&mut records, order);
        Ok(records)
    }

    async fn announce(conn: &mut ConnectionManager, id: &str) -> BackendResult<()> {
        let receivers: i64 = conn.publish(CHANGES_CHANNEL, id).await?;
        debug!("Announced change to {} on {} ({} listeners)", id, CHANGES_CHANNEL, receivers);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn subscribe(&self, order: CatalogOrder) -> BackendResult<Subscription> {
        let mut pubsub = self.client.get_async_connection().await?.into_pubsub();
        pubsub.subscribe(CHANGES_CHANNEL).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut conn = self.conn.clone();

        let _ = tx.send(Self::read_all(&mut conn, order).await);

        tokio::spawn(async move {
            let mut messages = Box::pin(pubsub.on_message());

            while messages.next().await.is_some() {
                let push = Self::read_all(&mut conn, order).await;
                if tx.send(push).is_err() {
                    debug!("Live query dropped, closing Redis subscription");
                    return;
                }
            }

            warn!("Redis change channel closed");
            let _ = tx.send(Err(BackendError::Closed));
        });

        info!("Opened live query on {} ({:?})", CHANGES_CHANNEL, order);
        Ok(rx)
    }

    async fn create(&self, fields: Fields) -> BackendResult<String> {
        let mut conn = self.conn.clone();
        let id = Uuid::new_v4().simple().to_string();

        let json = serde_json::to_string(&fields)?;
        let _: () = conn.set(document_key(&id), json).await?;
        let _: i64 = conn.sadd(INDEX_KEY, &id).await?;

        Self::announce(&mut conn, &id).await?;

        info!("Created catalog document: {}", id);
        Ok(id)
    }

    async fn update(&self, id: &str, fields: Fields) -> BackendResult<()> {
        let mut conn = self.conn.clone();

        let mut document = Self::read_document(&mut conn, id)
            .await?
            .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
        document.extend(fields);

        let json = serde_json::to_string(&document)?;
        let _: () = conn.set(document_key(id), json).await?;

        Self::announce(&mut conn, id).await?;

        info!("Updated catalog document: {}", id);
        Ok(())
    }

    async fn delete(&self, id: &str) -> BackendResult<()> {
        let mut conn = self.conn.clone();

        let deleted: i64 = conn.del(document_key(id)).await?;
        let _: i64 = conn.srem(INDEX_KEY, id).await?;

        if deleted > 0 {
            Self::announce(&mut conn, id).await?;
            info!("Deleted catalog document: {}", id);
        }

        Ok(())
    }
}
