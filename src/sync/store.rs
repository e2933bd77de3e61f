//! Hosted document store
//!
//! Holds JSON documents by path, issues anonymous identities, stamps each
//! write with a strictly increasing server timestamp and broadcasts the
//! resulting document to every watcher of that path.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::snapshot::fields;
use super::{Result, SyncError};

/// Buffered changes per watched document before slow watchers lag
const WATCH_CAPACITY: usize = 64;

/// Anonymous identity issued by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: Uuid,
    pub issued_at: DateTime<Utc>,
}

/// A committed write, as delivered to watchers
#[derive(Debug, Clone)]
pub struct DocumentChange {
    /// Channel that made the write
    pub origin: Uuid,
    pub last_updated: DateTime<Utc>,
    /// Full document after the write, `lastUpdated` included
    pub document: Value,
}

struct DocumentSlot {
    fields: Option<Map<String, Value>>,
    last_updated: Option<DateTime<Utc>>,
    tx: broadcast::Sender<DocumentChange>,
}

impl DocumentSlot {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            fields: None,
            last_updated: None,
            tx,
        }
    }

    /// Next server timestamp, strictly after the previous one.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_updated {
            Some(previous) if now <= previous => previous + Duration::milliseconds(1),
            _ => now,
        };
        self.last_updated = Some(stamp);
        stamp
    }

    fn document(&self) -> Option<Value> {
        let mut document = self.fields.clone()?;
        if let Some(stamp) = self.last_updated {
            document.insert(fields::LAST_UPDATED.to_string(), Value::String(stamp.to_rfc3339()));
        }
        Some(Value::Object(document))
    }
}

/// In-memory document store shared by every channel in the process
pub struct DocumentStore {
    documents: RwLock<HashMap<String, DocumentSlot>>,
    identities: RwLock<HashSet<Uuid>>,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            identities: RwLock::new(HashSet::new()),
        }
    }

    /// Issue a fresh anonymous identity.
    pub async fn sign_in_anonymously(&self) -> Identity {
        let identity = Identity {
            uid: Uuid::new_v4(),
            issued_at: Utc::now(),
        };
        self.identities.write().await.insert(identity.uid);
        info!(uid = %identity.uid, "Issued anonymous identity");
        identity
    }

    pub async fn authorize(&self, uid: Uuid) -> Result<()> {
        if self.identities.read().await.contains(&uid) {
            Ok(())
        } else {
            Err(SyncError::NotAuthenticated)
        }
    }

    /// Current document at `path`, or `None` if nothing was written yet.
    pub async fn read(&self, uid: Uuid, path: &str) -> Result<Option<Value>> {
        self.authorize(uid).await?;
        Ok(self.documents.read().await.get(path).and_then(DocumentSlot::document))
    }

    /// Overwrite the document with `fields`.
    pub async fn set(
        &self,
        uid: Uuid,
        path: &str,
        origin: Uuid,
        fields: Map<String, Value>,
    ) -> Result<DateTime<Utc>> {
        self.write(uid, path, origin, fields, false).await
    }

    /// Merge top-level `fields` into the document, creating it if needed.
    pub async fn merge(
        &self,
        uid: Uuid,
        path: &str,
        origin: Uuid,
        fields: Map<String, Value>,
    ) -> Result<DateTime<Utc>> {
        self.write(uid, path, origin, fields, true).await
    }

    async fn write(
        &self,
        uid: Uuid,
        path: &str,
        origin: Uuid,
        mut incoming: Map<String, Value>,
        merge: bool,
    ) -> Result<DateTime<Utc>> {
        self.authorize(uid).await?;
        incoming.remove(fields::LAST_UPDATED);

        let mut documents = self.documents.write().await;
        let slot = documents.entry(path.to_string()).or_insert_with(DocumentSlot::new);

        match (&mut slot.fields, merge) {
            (Some(existing), true) => existing.extend(incoming),
            (current, _) => *current = Some(incoming),
        }
        let stamp = slot.stamp();

        if let Some(document) = slot.document() {
            let change = DocumentChange {
                origin,
                last_updated: stamp,
                document,
            };
            // No watchers is fine; the write is still committed.
            let watchers = slot.tx.send(change).unwrap_or(0);
            debug!(path, %origin, merge, watchers, "Document written");
        }
        Ok(stamp)
    }

    /// Watch every subsequent write to `path`.
    pub async fn watch(&self, uid: Uuid, path: &str) -> Result<broadcast::Receiver<DocumentChange>> {
        self.authorize(uid).await?;
        let mut documents = self.documents.write().await;
        let slot = documents.entry(path.to_string()).or_insert_with(DocumentSlot::new);
        Ok(slot.tx.subscribe())
    }
}
