//! The action capability set.
//!
//! An action is a named unit of deferred work with a two-phase contract:
//! `payload` gathers input synchronously on the dispatching thread, and
//! `execute` consumes it later on the worker. `additions` and `removals`
//! describe registry changes applied once the execute phase succeeds.

use std::collections::BTreeMap;
use std::sync::Arc;

use commander_core::SharedConfig;

use crate::error::{ExecuteError, PayloadError};
use crate::value::Value;

/// Tag excluding an action from "last action" tracking.
pub const DEFAULT_TAG: &str = "default";

/// Shared handle to an action. Registry keys and aliases hold clones of
/// the same handle.
pub type ActionRef = Arc<dyn Action>;

/// Registry additions, keyed by the command key to bind.
pub type Additions = BTreeMap<String, ActionRef>;

pub trait Action: Send + Sync {
    /// Stable identity; the registry key and the result cache key.
    fn name(&self) -> String;

    fn description(&self) -> String {
        String::new()
    }

    /// Gather the payload. May block on operator input. Should only read
    /// the config.
    fn payload(&self, config: &SharedConfig) -> Result<Value, PayloadError>;

    /// Perform the effect. Runs on the worker, never from `payload`.
    fn execute(&self, config: &SharedConfig, payload: Value) -> Result<Value, ExecuteError>;

    /// Actions to bind after a successful execute.
    fn additions(&self, _config: &SharedConfig) -> Additions {
        Additions::new()
    }

    /// Keys to remove after a successful execute.
    fn removals(&self) -> Vec<String> {
        Vec::new()
    }

    fn tags(&self) -> Vec<String> {
        Vec::new()
    }

    fn has_tag(&self, tag: &str) -> bool {
        self.tags().iter().any(|t| t == tag)
    }
}

/// Whether two handles point at the same action.
pub fn same_action(a: &ActionRef, b: &ActionRef) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// The action that does nothing. Builders start from it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopAction;

impl Action for NopAction {
    fn name(&self) -> String {
        String::new()
    }

    fn payload(&self, _config: &SharedConfig) -> Result<Value, PayloadError> {
        Ok(Value::None)
    }

    fn execute(&self, _config: &SharedConfig, _payload: Value) -> Result<Value, ExecuteError> {
        Ok(Value::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tagged(Vec<&'static str>);

    impl Action for Tagged {
        fn name(&self) -> String {
            "tagged".to_string()
        }

        fn payload(&self, _config: &SharedConfig) -> Result<Value, PayloadError> {
            Ok(Value::None)
        }

        fn execute(&self, _config: &SharedConfig, payload: Value) -> Result<Value, ExecuteError> {
            Ok(payload)
        }

        fn tags(&self) -> Vec<String> {
            self.0.iter().map(|t| t.to_string()).collect()
        }
    }

    #[test]
    fn test_nop_action() {
        let config = SharedConfig::default();
        assert_eq!(NopAction.name(), "");
        assert_eq!(NopAction.payload(&config).unwrap(), Value::None);
        assert_eq!(NopAction.execute(&config, Value::from(1)).unwrap(), Value::None);
        assert!(NopAction.additions(&config).is_empty());
        assert!(NopAction.removals().is_empty());
        assert!(NopAction.tags().is_empty());
    }

    #[test]
    fn test_has_tag() {
        let action = Tagged(vec!["default", "help"]);
        assert!(action.has_tag(DEFAULT_TAG));
        assert!(action.has_tag("help"));
        assert!(!Tagged(vec!["watch"]).has_tag(DEFAULT_TAG));
    }

    #[test]
    fn test_same_action() {
        let a: ActionRef = Arc::new(Tagged(vec![]));
        let b: ActionRef = Arc::new(Tagged(vec![]));
        let a2 = Arc::clone(&a);
        assert!(same_action(&a, &a2));
        assert!(!same_action(&a, &b));
    }
}
