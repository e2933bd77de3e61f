//! Synchronization channel
//!
//! Wraps a [`SyncBackend`] with lazy anonymous sign-in, connection status,
//! a rolling fault log and origin tagging. Every write carries the channel's
//! origin id and subscriptions drop changes with that origin, so a client
//! never sees its own writes echoed back.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::snapshot::{SharedSnapshot, SnapshotPatch};
use super::store::{DocumentChange, DocumentStore, Identity};
use super::{Result, SyncError};

/// Faults kept for diagnostics
pub const MAX_FAULTS: usize = 5;

/// Remote document backend
pub trait SyncBackend: Send + Sync + 'static {
    fn sign_in_anonymously(&self) -> impl Future<Output = Result<Identity>> + Send;

    fn read(&self, uid: Uuid, path: &str) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// Overwrite (`merge == false`) or field-merge the document.
    fn write(
        &self,
        uid: Uuid,
        path: &str,
        origin: Uuid,
        fields: Map<String, Value>,
        merge: bool,
    ) -> impl Future<Output = Result<DateTime<Utc>>> + Send;

    fn watch(
        &self,
        uid: Uuid,
        path: &str,
    ) -> impl Future<Output = Result<broadcast::Receiver<DocumentChange>>> + Send;
}

impl SyncBackend for DocumentStore {
    async fn sign_in_anonymously(&self) -> Result<Identity> {
        Ok(DocumentStore::sign_in_anonymously(self).await)
    }

    async fn read(&self, uid: Uuid, path: &str) -> Result<Option<Value>> {
        DocumentStore::read(self, uid, path).await
    }

    async fn write(
        &self,
        uid: Uuid,
        path: &str,
        origin: Uuid,
        fields: Map<String, Value>,
        merge: bool,
    ) -> Result<DateTime<Utc>> {
        if merge {
            self.merge(uid, path, origin, fields).await
        } else {
            self.set(uid, path, origin, fields).await
        }
    }

    async fn watch(&self, uid: Uuid, path: &str) -> Result<broadcast::Receiver<DocumentChange>> {
        DocumentStore::watch(self, uid, path).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// One recorded channel fault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFault {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Outcome of a push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Written; carries the server timestamp
    Sent(DateTime<Utc>),
    /// Channel was not connected; the write was discarded
    Dropped,
}

struct ChannelState {
    status: ConnectionStatus,
    identity: Option<Identity>,
    faults: VecDeque<ChannelFault>,
}

impl ChannelState {
    fn record(&mut self, err: &SyncError) {
        if self.faults.len() == MAX_FAULTS {
            self.faults.pop_front();
        }
        self.faults.push_back(ChannelFault {
            at: Utc::now(),
            message: err.to_string(),
        });
        self.status = ConnectionStatus::Error;
    }
}

fn lock(state: &Mutex<ChannelState>) -> MutexGuard<'_, ChannelState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Client side of the shared document
pub struct SyncChannel<B: SyncBackend> {
    backend: Arc<B>,
    path: String,
    origin: Uuid,
    state: Arc<Mutex<ChannelState>>,
}

impl<B: SyncBackend> Clone for SyncChannel<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            path: self.path.clone(),
            origin: self.origin,
            state: Arc::clone(&self.state),
        }
    }
}

impl<B: SyncBackend> SyncChannel<B> {
    pub fn new(backend: Arc<B>, path: impl Into<String>) -> Self {
        Self {
            backend,
            path: path.into(),
            origin: Uuid::new_v4(),
            state: Arc::new(Mutex::new(ChannelState {
                status: ConnectionStatus::Disconnected,
                identity: None,
                faults: VecDeque::with_capacity(MAX_FAULTS),
            })),
        }
    }

    pub fn origin(&self) -> Uuid {
        self.origin
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn status(&self) -> ConnectionStatus {
        lock(&self.state).status
    }

    /// Most recent faults, oldest first.
    pub fn faults(&self) -> Vec<ChannelFault> {
        lock(&self.state).faults.iter().cloned().collect()
    }

    /// A successful round trip clears a previous error status.
    fn recovered(&self) {
        let mut state = lock(&self.state);
        if state.status == ConnectionStatus::Error && state.identity.is_some() {
            info!(origin = %self.origin, "Channel recovered");
            state.status = ConnectionStatus::Connected;
        }
    }

    fn fail<T>(&self, err: SyncError) -> Result<T> {
        error!(path = %self.path, "Channel fault: {}", err);
        lock(&self.state).record(&err);
        Err(err)
    }

    /// Sign in anonymously. Idempotent; a failure is not retried.
    pub async fn authenticate(&self) -> Result<Identity> {
        {
            let mut state = lock(&self.state);
            if let Some(identity) = &state.identity {
                return Ok(identity.clone());
            }
            state.status = ConnectionStatus::Connecting;
        }

        match self.backend.sign_in_anonymously().await {
            Ok(identity) => {
                let mut state = lock(&self.state);
                // A concurrent caller may have won; keep the first identity.
                let identity = state.identity.get_or_insert(identity).clone();
                state.status = ConnectionStatus::Connected;
                info!(uid = %identity.uid, origin = %self.origin, "Channel connected");
                Ok(identity)
            }
            Err(err) => self.fail(err),
        }
    }

    async fn uid(&self) -> Result<Uuid> {
        Ok(self.authenticate().await?.uid)
    }

    /// One-shot read; `None` means no session exists yet.
    pub async fn fetch_existing(&self) -> Result<Option<SharedSnapshot>> {
        let uid = self.uid().await?;
        let document = match self.backend.read(uid, &self.path).await {
            Ok(document) => {
                self.recovered();
                document
            }
            Err(err) => return self.fail(err),
        };
        match document.map(SharedSnapshot::from_document).transpose() {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => self.fail(err.into()),
        }
    }

    /// Overwrite the document with `snapshot`, marking the controller active.
    pub async fn initialize(&self, snapshot: &SharedSnapshot) -> Result<DateTime<Utc>> {
        let uid = self.uid().await?;
        let mut baseline = snapshot.clone();
        baseline.controller_active = true;
        let fields = match baseline.to_fields() {
            Ok(fields) => fields,
            Err(err) => return self.fail(err.into()),
        };

        match self.backend.write(uid, &self.path, self.origin, fields, false).await {
            Ok(stamp) => {
                self.recovered();
                info!(path = %self.path, "Document initialized");
                Ok(stamp)
            }
            Err(err) => self.fail(err),
        }
    }

    /// Merge `patch` into the document. Dropped while disconnected; attempted
    /// (and possibly failing again) after an earlier fault.
    pub async fn push(&self, patch: SnapshotPatch) -> Result<PushOutcome> {
        if patch.is_empty() {
            return Ok(PushOutcome::Dropped);
        }
        let uid = {
            let state = lock(&self.state);
            match (&state.identity, state.status) {
                (Some(identity), ConnectionStatus::Connected | ConnectionStatus::Error) => identity.uid,
                (_, status) => {
                    warn!(?status, fields = ?patch.field_names(), "Dropping push while not connected");
                    return Ok(PushOutcome::Dropped);
                }
            }
        };

        let names = patch.field_names().join(",");
        match self
            .backend
            .write(uid, &self.path, self.origin, patch.into_fields(), true)
            .await
        {
            Ok(stamp) => {
                self.recovered();
                debug!(fields = %names, %stamp, "Pushed");
                Ok(PushOutcome::Sent(stamp))
            }
            Err(err) => self.fail(err),
        }
    }

    /// Listen for changes made by other channels.
    pub async fn subscribe(&self) -> Result<Subscription> {
        let uid = self.uid().await?;
        match self.backend.watch(uid, &self.path).await {
            Ok(rx) => {
                self.recovered();
                Ok(Subscription {
                    rx,
                    origin: self.origin,
                    state: Arc::clone(&self.state),
                })
            }
            Err(err) => self.fail(err),
        }
    }

    /// Forget the identity; the next call signs in again.
    pub fn disconnect(&self) {
        let mut state = lock(&self.state);
        state.identity = None;
        state.status = ConnectionStatus::Disconnected;
        info!(origin = %self.origin, "Channel disconnected");
    }
}

/// Stream of remote snapshots, own writes excluded
pub struct Subscription {
    rx: broadcast::Receiver<DocumentChange>,
    origin: Uuid,
    state: Arc<Mutex<ChannelState>>,
}

impl Subscription {
    /// Next snapshot written by someone else; `None` once the feed closes.
    pub async fn next(&mut self) -> Option<SharedSnapshot> {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.origin == self.origin => {
                    debug!(stamp = %change.last_updated, "Skipping own write");
                }
                Ok(change) => match SharedSnapshot::from_document(change.document) {
                    Ok(snapshot) => return Some(snapshot),
                    Err(err) => {
                        let err = SyncError::from(err);
                        warn!("Undecodable snapshot: {}", err);
                        lock(&self.state).record(&err);
                    }
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Snapshots are self-describing, the next one catches up.
                    warn!(skipped, "Subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    lock(&self.state).record(&SyncError::SubscriptionClosed);
                    return None;
                }
            }
        }
    }
}
