//! Error types for the action framework.
//!
//! The split mirrors the two dispatch phases: payload errors surface to
//! whoever dispatched, execute errors are captured inside the work.

use std::time::Duration;

use commander_core::error::CommanderError;

use crate::scan::ScanError;
use crate::value::{Shape, Value};

/// A payload had a different shape than the adapter expected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected} payload, got {actual}")]
pub struct ShapeMismatch {
    pub expected: Shape,
    pub actual: Shape,
}

/// Errors from an action's payload phase.
///
/// `Skip` and `Quit` are signals rather than failures: `Skip` carries the
/// gathered payload and completes the dispatch without running execute,
/// `Quit` asks the hosting session to terminate.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("skip")]
    Skip(Value),
    #[error("quit")]
    Quit,
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("No option named {choice:?} after {attempts} attempts")]
    InvalidChoice { choice: String, attempts: usize },
    #[error("Type mismatch: {0}")]
    TypeMismatch(#[from] ShapeMismatch),
    #[error("Config error: {0}")]
    Config(#[from] CommanderError),
    #[error("Command registry is no longer available")]
    RegistryUnavailable,
    #[error("Payload failed: {0}")]
    Failed(String),
}

/// Errors from an action's execute phase. Stored on the work, never returned
/// to the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("Type mismatch: {0}")]
    TypeMismatch(#[from] ShapeMismatch),
    #[error("Config error: {0}")]
    Config(#[from] CommanderError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Runtime unavailable: {0}")]
    Runtime(String),
    #[error("Command registry is no longer available")]
    RegistryUnavailable,
    #[error("Execute failed: {0}")]
    Failed(String),
}

/// Errors returned from a dispatch.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("Work queue is closed; {0} was not queued")]
    QueueClosed(String),
}

impl DispatchError {
    /// Whether the dispatched action asked the session to terminate.
    pub fn is_quit(&self) -> bool {
        matches!(self, DispatchError::Payload(PayloadError::Quit))
    }
}

/// Errors from waiting on a work.
#[derive(Debug, thiserror::Error)]
pub enum WorkError {
    #[error("Timed out after {0:?} waiting for work")]
    WaitTimeout(Duration),
}

/// Errors from constructing a command registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Command registry must be created inside a tokio runtime")]
    NoRuntime,
    #[error("Failed to start work queue: {0}")]
    Worker(#[from] std::io::Error),
}
