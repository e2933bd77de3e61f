//! On-screen message overlay
//!
//! Messages ride in the shared document next to the timers: one current
//! message plus a FIFO queue waiting behind it.

pub mod board;

pub use board::{Message, MessageBoard, MessagePreset, MAX_QUEUED_MESSAGES};

/// Overlay result type
pub type Result<T> = std::result::Result<T, OverlayError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OverlayError {
    #[error("Message text must not be empty")]
    EmptyMessage,

    #[error("Invalid hide delay: {0}")]
    InvalidHideAfter(f64),

    #[error("No preset message at index {0}")]
    UnknownPreset(usize),

    #[error("Message queue is full ({0} waiting)")]
    QueueFull(usize),
}
