//! Shared document synchronization
//!
//! The whole controller state is replicated as one JSON document. Writers
//! overwrite it on initialization and merge top-level fields afterwards; the
//! store stamps every write with a server timestamp and fans the resulting
//! document out to subscribers.

pub mod channel;
pub mod snapshot;
pub mod store;

pub use channel::{ChannelFault, ConnectionStatus, PushOutcome, Subscription, SyncBackend, SyncChannel};
pub use snapshot::{DisplaySettings, SharedSnapshot, SnapshotPatch};
pub use store::{DocumentChange, DocumentStore, Identity};

/// Well-known path of the shared timer document
pub const DEFAULT_DOCUMENT_PATH: &str = "timer-data/shared-timer-data";

/// Sync result type
pub type Result<T> = std::result::Result<T, SyncError>;

/// Channel and store failures. None of these reach the timer model.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Subscription closed")]
    SubscriptionClosed,
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}
