// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Probe state directory and configuration file.
//!
//! Everything the probe persists lives in one directory under the user's
//! home: `config.json` (api base, bearer token, user id), `probe.pid`, and
//! `probe.log`.

use std::path::{Path, PathBuf};

use linkmap_core::LinkmapError;
use serde::{Deserialize, Serialize};

/// Directory name under the home directory.
const STATE_DIR_NAME: &str = ".linkmap-probe";

/// The probe's on-disk state directory.
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    /// The default location, `~/.linkmap-probe`.
    pub fn default_location() -> Result<Self, LinkmapError> {
        let home = dirs::home_dir()
            .ok_or_else(|| LinkmapError::Config("cannot determine home directory".into()))?;
        Ok(Self {
            root: home.join(STATE_DIR_NAME),
        })
    }

    /// A state dir rooted at an explicit path (tests).
    pub fn at(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the directory if missing.
    pub fn ensure(&self) -> Result<(), LinkmapError> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            LinkmapError::Config(format!("cannot create {}: {e}", self.root.display()))
        })
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.root.join("probe.pid")
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join("probe.log")
    }
}

/// Contents of `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Coordinator base URL, e.g. `https://links.example.com`.
    pub api_base: String,
    /// Bearer token from device-code enrollment. `None` after logout.
    #[serde(default)]
    pub access_token: Option<String>,
    /// The enrolled user's id.
    #[serde(default)]
    pub user_id: Option<i64>,
    /// External command for Twitter scrapes. Receives the URL as its only
    /// argument and prints scrape JSON on stdout.
    #[serde(default = "default_twitter_cmd")]
    pub twitter_fetcher_cmd: String,
    /// External command for web scrapes (headless browser + extractor).
    #[serde(default = "default_browser_cmd")]
    pub browser_fetcher_cmd: String,
}

fn default_twitter_cmd() -> String {
    "linkmap-twitter-fetch".to_string()
}

fn default_browser_cmd() -> String {
    "linkmap-browser-fetch".to_string()
}

impl ProbeConfig {
    pub fn new(api_base: String) -> Self {
        Self {
            api_base,
            access_token: None,
            user_id: None,
            twitter_fetcher_cmd: default_twitter_cmd(),
            browser_fetcher_cmd: default_browser_cmd(),
        }
    }

    /// Load from disk; `None` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, LinkmapError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LinkmapError::Config(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };
        let config = serde_json::from_str(&content).map_err(|e| {
            LinkmapError::Config(format!("malformed config {}: {e}", path.display()))
        })?;
        Ok(Some(config))
    }

    /// Write to disk.
    pub fn save(&self, path: &Path) -> Result<(), LinkmapError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| LinkmapError::Internal(format!("unserializable config: {e}")))?;
        std::fs::write(path, content).map_err(|e| {
            LinkmapError::Config(format!("cannot write {}: {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn state_dir_paths() {
        let state = StateDir::at(PathBuf::from("/tmp/probe-test"));
        assert!(state.config_path().ends_with("config.json"));
        assert!(state.pid_path().ends_with("probe.pid"));
        assert!(state.log_path().ends_with("probe.log"));
    }

    #[test]
    fn config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = ProbeConfig::new("https://links.example.com".into());
        config.access_token = Some("lmp_deadbeef".into());
        config.user_id = Some(42);
        config.save(&path).unwrap();

        let loaded = ProbeConfig::load(&path).unwrap().unwrap();
        assert_eq!(loaded.api_base, "https://links.example.com");
        assert_eq!(loaded.access_token.as_deref(), Some("lmp_deadbeef"));
        assert_eq!(loaded.user_id, Some(42));
        assert_eq!(loaded.twitter_fetcher_cmd, "linkmap-twitter-fetch");
    }

    #[test]
    fn missing_config_is_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert!(ProbeConfig::load(&path).unwrap().is_none());
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(ProbeConfig::load(&path).is_err());
    }
}
