//! API response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    display::RenderableTimer,
    overlay::{Message, MessageBoard, MessagePreset, OverlayError},
    state::CommandError,
    sync::{ChannelFault, ConnectionStatus, SyncError},
    timer::{TimerCollection, TimerError, TimerId},
};

/// Envelope for every successful command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Create a new API response
    pub fn new(status: String, message: String, data: T) -> Self {
        Self {
            status,
            message,
            timestamp: Utc::now(),
            data,
        }
    }

    /// Create an ok response
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::new("ok".to_string(), message.into(), data)
    }
}

/// Body of a failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Timer collection plus the operator preview of the active timer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimersView {
    pub timers: TimerCollection,
    pub preview: RenderableTimer,
}

/// Current overlay state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesView {
    pub current_message: Option<Message>,
    pub message_queue: Vec<Message>,
    pub presets: Vec<MessagePreset>,
}

impl From<&MessageBoard> for MessagesView {
    fn from(board: &MessageBoard) -> Self {
        Self {
            current_message: board.current_message.clone(),
            message_queue: board.message_queue.iter().cloned().collect(),
            presets: board.presets().to_vec(),
        }
    }
}

/// Result of a raw document write
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResponse {
    pub last_updated: DateTime<Utc>,
}

/// Server and channel diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub connection: ConnectionStatus,
    pub origin: Uuid,
    pub document_path: String,
    pub faults: Vec<ChannelFault>,
    pub timer_count: usize,
    pub active_timer_id: Option<TimerId>,
    pub running_timers: usize,
    pub display_enabled: bool,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Request failure, mapped onto an HTTP status
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Document not found: {0}")]
    DocumentMissing(String),

    #[error("Display is disabled")]
    DisplayDisabled,
}

impl From<TimerError> for ApiError {
    fn from(err: TimerError) -> Self {
        ApiError::Command(err.into())
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Command(CommandError::Timer(TimerError::NotFound(_)))
            | ApiError::Command(CommandError::Overlay(OverlayError::UnknownPreset(_)))
            | ApiError::DocumentMissing(_)
            | ApiError::DisplayDisabled => StatusCode::NOT_FOUND,
            ApiError::Command(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Sync(SyncError::NotAuthenticated) => StatusCode::UNAUTHORIZED,
            ApiError::Sync(SyncError::Serialization(_)) => StatusCode::BAD_REQUEST,
            ApiError::Sync(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            status: "error".to_string(),
            message: self.to_string(),
            timestamp: Utc::now(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
