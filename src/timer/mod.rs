//! Timer model
//!
//! Single-timer clock arithmetic, the ordered timer collection the controller
//! mutates, and display text formatting.

pub mod clock;
pub mod collection;
pub mod format;

use uuid::Uuid;

pub use clock::{TickOutcome, TimerState, TimerStatus, TimerVariant};
pub use collection::{Timer, TimerCollection, TimerUpdate};

/// Opaque timer identifier
pub type TimerId = Uuid;

/// Timer result type
pub type Result<T> = std::result::Result<T, TimerError>;

/// Validation failures from timer commands; state is never mutated when
/// one of these is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimerError {
    #[error("Invalid duration: {0}")]
    InvalidDuration(f64),

    #[error("Malformed time string: {0:?}")]
    MalformedTime(String),

    #[error("Timer not found: {0}")]
    NotFound(TimerId),

    #[error("Reorder must list every timer exactly once")]
    InvalidOrder,

    #[error("Status cannot be set directly: {0:?}")]
    IllegalStatus(TimerStatus),

    #[error("Timer name must not be empty")]
    EmptyName,
}
