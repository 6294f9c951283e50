//! Session config codec.
//!
//! The session config is the JSON value that actions read during their
//! payload phase and mutate during execution. It is shared between the
//! foreground session, the worker and any recurring watch tasks.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::Result;

/// The JSON document a session operates on.
///
/// `file` is the default path used by `save` when the operator does not
/// name one. Every other key is opaque to the framework.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl SessionConfig {
    /// Decode a session config from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode as indented JSON.
    pub fn to_vec_pretty(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Read and decode a session config file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let config = Self::from_slice(&bytes)?;
        info!(path = %path.display(), keys = config.values.len(), "Session config loaded");
        Ok(config)
    }

    /// Encode and write the session config, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_vec_pretty()?)?;
        info!(path = %path.display(), "Session config saved");
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    /// The whole document as a JSON value, `file` included.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Shared handle to the session config.
///
/// Cloning is cheap. Reads and writes are serialized by a readers-writer
/// lock: a write performed by a work's execute is visible to every read that
/// starts after that execute returns, including the dispatch's own waiter.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<SessionConfig>>,
}

impl SharedConfig {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Clone of the current document.
    pub fn snapshot(&self) -> SessionConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the whole document, returning the previous one.
    pub fn replace(&self, config: SessionConfig) -> SessionConfig {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        debug!(keys = config.values.len(), "Session config replaced");
        std::mem::replace(&mut *guard, config)
    }

    /// Run `f` with exclusive access to the document.
    pub fn update<R>(&self, f: impl FnOnce(&mut SessionConfig) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Run `f` with shared access to the document.
    pub fn read<R>(&self, f: impl FnOnce(&SessionConfig) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.read(|config| config.get(key).cloned())
    }

    pub fn set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.update(|config| config.set(key, value))
    }
}
