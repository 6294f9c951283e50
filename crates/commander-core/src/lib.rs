//! Shared foundations for the commander workspace.
//!
//! Settings, the session config codec, error types, session events and the
//! small formatting/path helpers the interactive surface relies on.

pub mod config;
pub mod error;
pub mod events;
pub mod paths;
pub mod pretty;
pub mod session;

pub use config::Settings;
pub use error::{CommanderError, Result};
pub use events::SessionEvent;
pub use session::{SessionConfig, SharedConfig};
