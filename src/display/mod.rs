//! Display-side reconciliation and rendering

pub mod frame;
pub mod reconcile;

pub use frame::{DisplayFrame, RenderableTimer, Urgency};
pub use reconcile::{ApplyOutcome, Reconciler};
