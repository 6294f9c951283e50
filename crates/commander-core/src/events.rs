use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notices emitted while a session dispatches commands.
///
/// The registry broadcasts these; the library itself never writes to the
/// terminal. Subscribers decide how to render them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SessionEvent {
    /// A dispatch began its payload phase.
    DispatchStarted { name: String },
    /// The payload returned the skip signal; execute will not run.
    ExecuteSkipped { name: String },
    /// The dispatch's work completed (successfully or not).
    DispatchFinished { name: String, work_id: Uuid },
    /// A lookup key was unknown or removed; help was dispatched instead.
    UnknownCommand { key: String },
    /// Text an action wants shown to the operator.
    Output { source: String, text: String },
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::DispatchStarted { name } => write!(f, "executing action {}", name),
            SessionEvent::ExecuteSkipped { .. } => write!(f, "skipping execution function"),
            SessionEvent::DispatchFinished { name, .. } => {
                write!(f, "finished action {}, examine it with lookup", name)
            }
            SessionEvent::UnknownCommand { key } => write!(f, "unknown command: {}", key),
            SessionEvent::Output { text, .. } => write!(f, "{}", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let started = SessionEvent::DispatchStarted {
            name: "help".to_string(),
        };
        assert_eq!(started.to_string(), "executing action help");

        let unknown = SessionEvent::UnknownCommand {
            key: "frobnicate".to_string(),
        };
        assert_eq!(unknown.to_string(), "unknown command: frobnicate");

        let finished = SessionEvent::DispatchFinished {
            name: "save".to_string(),
            work_id: Uuid::nil(),
        };
        assert!(finished.to_string().starts_with("finished action save"));
    }

    #[test]
    fn test_serde_round_trip_output() {
        let event = SessionEvent::Output {
            source: "tags".to_string(),
            text: "default".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
