use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Settings for the commander binary and its worker queue.
///
/// Loaded from `~/.commander/settings.toml` by default. This is distinct
/// from the session config, which is the JSON value actions read and mutate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub general: GeneralSettings,
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub watch: WatchSettings,
}

impl Settings {
    /// Read and parse a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&text)?;
        info!(
            path = %path.display(),
            queue_capacity = settings.queue.capacity,
            watch_interval_secs = settings.watch.interval_secs,
            "Commander settings loaded"
        );
        Ok(settings)
    }

    /// Like [`Settings::load`], but a missing or malformed file yields the
    /// built-in defaults. Only a malformed file logs a warning.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "No settings file; using built-in defaults");
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable settings file");
            Self::default()
        })
    }

    /// Write the settings as TOML, creating the settings directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        info!(path = %path.display(), "Commander settings saved");
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Work queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Number of queued works the dispatcher may run ahead of the worker.
    pub capacity: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self { capacity: 10 }
    }
}

/// Interactive session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Question shown when the session waits for a command.
    pub prompt: String,
    /// Session config file loaded before the first prompt.
    pub startup_config: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            prompt: "please type a command".to_string(),
            startup_config: None,
        }
    }
}

/// Recurring action settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Seconds between ticks of watch actions created by the binary.
    pub interval_secs: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}
