use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

const DEFAULT_SYNC_DEBOUNCE_MS: u64 = 500;

fn default_seed_labels() -> Vec<String> {
    ["Deep Work", "Admin", "Learning"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Remote endpoint the sync layer talks to. Sync stays off until both
/// fields are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RemoteSettings {
    pub url: String,
    pub anon_key: String,
}

impl RemoteSettings {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.anon_key.trim().is_empty()
    }
}

/// User settings from settings.toml. Every field has a default so a
/// partial (or absent) file works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub remote: RemoteSettings,
    /// Focus areas a brand-new board starts with
    pub seed_labels: Vec<String>,
    /// Quiet window that collapses rapid mutations into one remote write
    pub sync_debounce_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remote: RemoteSettings::default(),
            seed_labels: default_seed_labels(),
            sync_debounce_ms: DEFAULT_SYNC_DEBOUNCE_MS,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("tempo");
        path.push("settings.toml");
        Some(path)
    }

    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!("failed to read {}: {}", path.display(), err);
                return Self::default();
            }
        };

        match toml::from_str(&content) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("invalid settings file {}, using defaults: {}", path.display(), err);
                Self::default()
            }
        }
    }
}
