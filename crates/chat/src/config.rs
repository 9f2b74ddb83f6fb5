//! Client settings
//!
//! Loaded in this order:
//! 1. `settings.json` in the Courier config directory (if present)
//! 2. Built-in defaults for anything the file leaves out
//! 3. Environment overrides (`COURIER_BASE_URL`, `COURIER_REGISTRATION_URL`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings filename in the Courier config directory
const SETTINGS_FILE: &str = "settings.json";

/// Intervals below this are clamped to avoid busy loops
const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Tunables for talking to the message store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Base URL of the session backend (no trailing slash needed)
    pub base_url: String,
    /// WebSocket endpoint of the registration service
    pub registration_url: String,
    /// Delay between readiness checks while bootstrapping
    pub bootstrap_poll_ms: u64,
    /// Period of the incremental message loop
    pub message_poll_ms: u64,
    /// Period of the new-conversation discovery loop
    pub discovery_poll_ms: u64,
    /// Grace delay after a successful close request
    pub close_grace_ms: u64,
    /// Per-request timeout for HTTP calls
    pub request_timeout_ms: u64,
    /// SQLite file (in the config directory) holding date buckets
    pub bucket_db_file: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            registration_url: "wss://messenger-server.fly.dev".to_string(),
            bootstrap_poll_ms: 300,
            message_poll_ms: 2000,
            discovery_poll_ms: 2000,
            close_grace_ms: 1000,
            request_timeout_ms: 10_000,
            bucket_db_file: "date-buckets.sqlite".to_string(),
        }
    }
}

impl ClientSettings {
    /// Load settings from the config directory, then apply env overrides
    pub fn load() -> Result<Self> {
        let settings = if config::config_exists(SETTINGS_FILE) {
            config::load_json(SETTINGS_FILE)?
        } else {
            Self::default()
        };
        Ok(settings.with_env_overrides())
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings: Self = config::load_json_file(path)?;
        Ok(settings.with_env_overrides())
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse settings JSON")
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("COURIER_BASE_URL") {
            self.base_url = url;
        }
        if let Ok(url) = std::env::var("COURIER_REGISTRATION_URL") {
            self.registration_url = url;
        }
        self
    }

    /// Default settings file path
    pub fn default_settings_path() -> Option<PathBuf> {
        config::config_path(SETTINGS_FILE)
    }

    /// Write these settings to `settings.json` in the config directory
    pub fn save(&self) -> Result<PathBuf> {
        config::save_json(SETTINGS_FILE, self)?;
        Self::default_settings_path().context("Could not determine config directory")
    }

    /// Write these settings to a specific JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        config::save_json_file(path, self)
    }

    /// Path of the date-bucket database
    pub fn bucket_db_path(&self) -> Option<PathBuf> {
        config::config_path(&self.bucket_db_file)
    }

    pub fn bootstrap_interval(&self) -> Duration {
        clamp_interval(self.bootstrap_poll_ms)
    }

    pub fn message_interval(&self) -> Duration {
        clamp_interval(self.message_poll_ms)
    }

    pub fn discovery_interval(&self) -> Duration {
        clamp_interval(self.discovery_poll_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        clamp_interval(self.request_timeout_ms)
    }

    /// Base URL with any trailing slash removed
    pub fn api_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

fn clamp_interval(ms: u64) -> Duration {
    Duration::from_millis(ms).max(MIN_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_timings() {
        let settings = ClientSettings::default();
        assert_eq!(settings.bootstrap_interval(), Duration::from_millis(300));
        assert_eq!(settings.message_interval(), Duration::from_millis(2000));
        assert_eq!(settings.discovery_interval(), Duration::from_millis(2000));
        assert_eq!(settings.close_grace(), Duration::from_millis(1000));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "base_url": "http://chat.local:9000/", "message_poll_ms": 500 }"#;
        let settings = ClientSettings::from_json(json).unwrap();
        assert_eq!(settings.api_root(), "http://chat.local:9000");
        assert_eq!(settings.message_interval(), Duration::from_millis(500));
        assert_eq!(settings.discovery_poll_ms, 2000);
        assert_eq!(settings.bucket_db_file, "date-buckets.sqlite");
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let settings = ClientSettings {
            message_poll_ms: 0,
            ..ClientSettings::default()
        };
        assert_eq!(settings.message_interval(), MIN_INTERVAL);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = ClientSettings {
            bootstrap_poll_ms: 50,
            bucket_db_file: "buckets.db".to_string(),
            ..ClientSettings::default()
        };

        settings.save_to_file(&path).unwrap();
        let loaded = ClientSettings::from_file(&path).unwrap();
        assert_eq!(loaded.bootstrap_poll_ms, 50);
        assert_eq!(loaded.bucket_db_file, "buckets.db");
        assert_eq!(loaded.message_poll_ms, settings.message_poll_ms);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ClientSettings::from_file(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_invalid_json() {
        assert!(ClientSettings::from_json("{ not json").is_err());
    }
}
