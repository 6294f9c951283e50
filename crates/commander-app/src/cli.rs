//! CLI argument definitions for the commander binary.
//!
//! Priority resolution: CLI args > env vars > settings file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Commander: an interactive session that dispatches named actions.
#[derive(Parser, Debug)]
#[command(name = "commander", version, about)]
pub struct CliArgs {
    /// Path to the settings file.
    #[arg(short = 's', long = "settings")]
    pub settings: Option<PathBuf>,

    /// Session config (JSON) to load before the first prompt.
    #[arg(long = "load")]
    pub load: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the settings file path.
    ///
    /// Priority: --settings flag > COMMANDER_SETTINGS env var > ~/.commander/settings.toml.
    pub fn resolve_settings_path(&self) -> PathBuf {
        if let Some(ref p) = self.settings {
            return p.clone();
        }
        if let Ok(p) = std::env::var("COMMANDER_SETTINGS") {
            return PathBuf::from(p);
        }
        default_settings_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > settings value. `RUST_LOG` still wins
    /// over both when the subscriber is built.
    pub fn resolve_log_level(&self, settings_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| settings_level.to_string())
    }

    /// Resolve the session config to load at startup, if any.
    ///
    /// Priority: --load flag > settings value.
    pub fn resolve_startup_config(&self, settings_value: Option<&str>) -> Option<String> {
        self.load
            .clone()
            .or_else(|| settings_value.map(str::to_string))
            .filter(|p| !p.trim().is_empty())
    }
}

/// Default settings file path for the current platform.
fn default_settings_path() -> PathBuf {
    match commander_core::paths::home_dir() {
        Ok(home) => home.join(".commander").join("settings.toml"),
        Err(_) => PathBuf::from("settings.toml"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_wins_for_settings_path() {
        let args = CliArgs::parse_from(["commander", "--settings", "/tmp/custom.toml"]);
        assert_eq!(args.resolve_settings_path(), PathBuf::from("/tmp/custom.toml"));
    }

    #[test]
    fn test_log_level_falls_back_to_settings() {
        let args = CliArgs::parse_from(["commander"]);
        assert_eq!(args.resolve_log_level("warn"), "warn");

        let args = CliArgs::parse_from(["commander", "-l", "debug"]);
        assert_eq!(args.resolve_log_level("warn"), "debug");
    }

    #[test]
    fn test_startup_config_priority() {
        let args = CliArgs::parse_from(["commander", "--load", "flag.json"]);
        assert_eq!(
            args.resolve_startup_config(Some("settings.json")).as_deref(),
            Some("flag.json")
        );

        let args = CliArgs::parse_from(["commander"]);
        assert_eq!(
            args.resolve_startup_config(Some("settings.json")).as_deref(),
            Some("settings.json")
        );
        assert_eq!(args.resolve_startup_config(Some("  ")), None);
        assert_eq!(args.resolve_startup_config(None), None);
    }
}
