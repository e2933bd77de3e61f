//! Hosted document endpoints
//!
//! Lets remote displays (and other controllers) sign in anonymously, read and
//! write the shared document, and follow it as a server-sent event stream.
//! Writers identify themselves with an `origin`; the event stream skips
//! changes carrying the caller's own origin.

use std::sync::Arc;
use axum::{
    extract::{Query, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    state::AppState,
    sync::{DocumentChange, Identity},
};
use super::responses::{ApiError, WriteResponse};

#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    pub uid: Uuid,
    /// Writer id; generated per request when absent
    pub origin: Option<Uuid>,
    /// Defaults to the server's document path
    pub path: Option<String>,
}

impl DocumentQuery {
    fn path<'a>(&'a self, state: &'a AppState) -> &'a str {
        self.path.as_deref().unwrap_or_else(|| state.channel.path())
    }
}

fn change_event(change: &DocumentChange) -> Result<Event, axum::Error> {
    Event::default()
        .event("snapshot")
        .id(change.last_updated.to_rfc3339())
        .json_data(&change.document)
}

/// Handle POST /auth/anonymous
pub async fn sign_in_handler(State(state): State<Arc<AppState>>) -> Json<Identity> {
    Json(state.store.sign_in_anonymously().await)
}

/// Handle GET /document
pub async fn read_document_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<Value>, ApiError> {
    let path = query.path(&state);
    match state.store.read(query.uid, path).await? {
        Some(document) => Ok(Json(document)),
        None => Err(ApiError::DocumentMissing(path.to_string())),
    }
}

/// Handle PUT /document - Overwrite the document
pub async fn set_document_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DocumentQuery>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<Json<WriteResponse>, ApiError> {
    let origin = query.origin.unwrap_or_else(Uuid::new_v4);
    let last_updated = state
        .store
        .set(query.uid, query.path(&state), origin, fields)
        .await?;
    info!(uid = %query.uid, %origin, "Document overwritten remotely");
    Ok(Json(WriteResponse { last_updated }))
}

/// Handle PATCH /document - Merge top-level fields
pub async fn merge_document_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DocumentQuery>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<Json<WriteResponse>, ApiError> {
    let origin = query.origin.unwrap_or_else(Uuid::new_v4);
    let last_updated = state
        .store
        .merge(query.uid, query.path(&state), origin, fields)
        .await?;
    debug!(uid = %query.uid, %origin, "Document merged remotely");
    Ok(Json(WriteResponse { last_updated }))
}

/// Handle GET /document/events
///
/// Starts with the current document, if any, then streams every write not
/// made by `origin`.
pub async fn document_events_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DocumentQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let path = query.path(&state).to_string();
    let rx = state.store.watch(query.uid, &path).await?;
    let initial = state.store.read(query.uid, &path).await?.map(|document| {
        Event::default().event("snapshot").json_data(&document)
    });
    let origin = query.origin;
    info!(uid = %query.uid, path = %path, "Document event stream opened");

    let changes = stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(change) if Some(change.origin) == origin => continue,
                Ok(change) => return Some((change_event(&change), rx)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Document event stream lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    let stream = stream::iter(initial).chain(changes);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
