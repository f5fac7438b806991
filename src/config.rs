//! Settings
//!
//! Persistent defaults for the CLI, stored as JSON under the user's config
//! directory. Command-line flags override them, and they override the gcloud
//! defaults.

use crate::gcp::client::COMPUTE_BASE_URL;
use crate::resource::cache::DEFAULT_TTL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR: &str = "gce-provisioner";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub project_id: Option<String>,
    pub zone: Option<String>,
    pub api_base_url: String,
    pub cache_ttl_secs: u64,
    pub poll_interval_secs: u64,
    pub poll_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_id: None,
            zone: None,
            api_base_url: COMPUTE_BASE_URL.to_string(),
            cache_ttl_secs: DEFAULT_TTL.as_secs(),
            poll_interval_secs: 3,
            poll_timeout_secs: 600,
        }
    }
}

/// `<config_dir>/gce-provisioner`
pub fn app_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

impl Settings {
    fn settings_path() -> Option<PathBuf> {
        app_dir().map(|p| p.join("config.json"))
    }

    /// Load settings, falling back to defaults when the file is missing or unreadable
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring settings file: {:#}", e);
                Self::default()
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
    }

    /// Write to `<config_dir>/gce-provisioner/config.json` and return the path
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::settings_path().context("No config directory available")?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Store new defaults. Unset arguments keep their current value.
    pub fn update_defaults(&mut self, project: Option<&str>, zone: Option<&str>) -> Result<()> {
        if let Some(project) = project {
            if !crate::gcp::auth::validate_project_id(project) {
                anyhow::bail!("Invalid project ID: {}", project);
            }
            self.project_id = Some(project.to_string());
        }
        if let Some(zone) = zone {
            self.zone = Some(zone.to_string());
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// flag > settings > gcloud default; empty when nothing is configured
    pub fn effective_project(&self, flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| self.project_id.clone())
            .or_else(crate::gcp::auth::get_default_project)
            .unwrap_or_default()
    }

    /// flag > settings > gcloud default > `us-central1-a`
    pub fn effective_zone(&self, flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| self.zone.clone())
            .or_else(crate::gcp::auth::get_default_zone)
            .unwrap_or_else(|| "us-central1-a".to_string())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"project_id": "my-project-123", "poll_timeout_secs": 60}"#)
                .unwrap();
        assert_eq!(settings.project_id.as_deref(), Some("my-project-123"));
        assert_eq!(settings.poll_timeout(), Duration::from_secs(60));
        assert_eq!(settings.poll_interval(), Duration::from_secs(3));
        assert_eq!(settings.api_base_url, COMPUTE_BASE_URL);
        assert_eq!(settings.cache_ttl(), Duration::from_secs(24 * 60 * 60));
    }

    #[test]
    fn test_flag_wins() {
        let settings = Settings {
            project_id: Some("from-settings".to_string()),
            zone: Some("europe-west1-b".to_string()),
            ..Default::default()
        };
        assert_eq!(settings.effective_project(Some("from-flag")), "from-flag");
        assert_eq!(settings.effective_project(None), "from-settings");
        assert_eq!(settings.effective_zone(None), "europe-west1-b");
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("gce-provisioner-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        let settings = Settings {
            zone: Some("asia-east1-a".to_string()),
            ..Default::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_update_defaults() {
        let mut settings = Settings {
            zone: Some("us-east1-b".to_string()),
            ..Default::default()
        };
        settings.update_defaults(Some("my-project-123"), None).unwrap();
        assert_eq!(settings.project_id.as_deref(), Some("my-project-123"));
        assert_eq!(settings.zone.as_deref(), Some("us-east1-b"));

        assert!(settings.update_defaults(Some("Bad_Project"), Some("x")).is_err());
        assert_eq!(settings.project_id.as_deref(), Some("my-project-123"));
    }
}
