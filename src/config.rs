//! Client configuration stored in config.toml

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::attachment::CategoryRoutes;

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Limits applied before an attachment is presigned and uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadLimits {
    /// Largest accepted attachment in bytes.
    pub max_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        UploadLimits {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Settings for one embedded chat client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the embedding application that hosts the session,
    /// upload and conversation endpoints.
    pub base_url: String,
    pub upload: UploadLimits,
    pub routes: CategoryRoutes,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: "http://localhost:3000".to_string(),
            upload: UploadLimits::default(),
            routes: CategoryRoutes::default(),
        }
    }
}

impl ClientConfig {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("colloquy").join("config.toml"))
    }

    /// Load configuration from the config file, or return defaults if
    /// not found or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        let Ok(content) = fs::read_to_string(&path) else {
            return Self::default();
        };

        toml::from_str(&content).unwrap_or_default()
    }

    /// Save configuration to the config file.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path().context("Could not determine config path")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config dir")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config")?;
        Ok(())
    }
}
