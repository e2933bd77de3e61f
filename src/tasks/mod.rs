//! Background tasks module
//!
//! This module contains background tasks that run alongside the HTTP server.

pub mod controller_tick;
pub mod display_projection;

// Re-export main functions
pub use controller_tick::controller_tick_task;
pub use display_projection::display_projection_task;
