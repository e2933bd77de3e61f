//! Stage Timer - A stage countdown timer with a synchronized display
//!
//! A controller owns a collection of named timers and a message overlay and
//! replicates them as one shared document. Displays follow that document and
//! project the active timer forward between syncs.

pub mod config;
pub mod timer;
pub mod overlay;
pub mod sync;
pub mod display;
pub mod state;
pub mod api;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use state::AppState;
pub use api::create_router;
pub use utils::signals::shutdown_signal;
