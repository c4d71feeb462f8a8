//! Persistent CLI settings.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use todolist_core::config::{has_http_scheme, non_blank, ClientConfig};

const SETTINGS_FILE_NAME: &str = "cli-config.json";

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliSettings {
    #[serde(default = "default_settings_version")]
    pub version: u32,
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub offline_mode: bool,
}

impl fmt::Debug for CliSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CliSettings")
            .field("version", &self.version)
            .field("server_url", &self.server_url)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("offline_mode", &self.offline_mode)
            .finish()
    }
}

const fn default_settings_version() -> u32 {
    1
}

pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("todolist")
        .join(SETTINGS_FILE_NAME)
}

impl CliSettings {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_settings_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut settings = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        settings.normalize();
        Ok(settings)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    pub fn set_server_url(&mut self, url: &str) -> Result<(), String> {
        let url = non_blank(Some(url.to_string()))
            .ok_or_else(|| "Server URL cannot be empty".to_string())?;
        if !has_http_scheme(&url) {
            return Err(format!(
                "Server URL must start with http:// or https://, got '{url}'"
            ));
        }
        self.server_url = Some(url.trim_end_matches('/').to_string());
        Ok(())
    }

    /// Fill what the environment left unset. Offline mode from either source wins.
    pub fn apply_to(&self, mut config: ClientConfig) -> Result<ClientConfig, String> {
        if config.server_url.is_none() {
            if let Some(url) = &self.server_url {
                config = config
                    .with_server_url(url.clone())
                    .map_err(|error| error.to_string())?;
            }
        }
        if config.auth_token.is_none() {
            config = config.with_auth_token(self.auth_token.clone());
        }
        if self.offline_mode {
            config = config.with_offline_mode(true);
        }
        Ok(config)
    }

    fn normalize(&mut self) {
        self.server_url = non_blank(self.server_url.take());
        self.auth_token = non_blank(self.auth_token.take());
    }
}
