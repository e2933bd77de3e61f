//! State management module
//!
//! The controller's authoritative state and the shared application state
//! that wires it to the sync channel and the embedded display.

pub mod app_state;
pub mod controller;

pub use app_state::AppState;
pub use controller::{Controller, ControllerTick, Field};

use crate::overlay::OverlayError;
use crate::timer::TimerError;

/// A rejected controller command
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Timer(#[from] TimerError),

    #[error(transparent)]
    Overlay(#[from] OverlayError),
}
