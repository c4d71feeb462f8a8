use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_SYNC_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// How far back incremental lists may reach; also the tombstone lifetime
    pub sync_window: Duration,
    /// Bearer token required on entry routes when set
    pub api_token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            sync_window: DEFAULT_SYNC_WINDOW,
            api_token: None,
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("sync_window", &self.sync_window)
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "TODOLIST_API_BIND_ADDR", DEFAULT_BIND_ADDR);

        let default_window = DEFAULT_SYNC_WINDOW.as_secs().to_string();
        let sync_window_secs =
            value_or_default(&lookup, "TODOLIST_API_SYNC_WINDOW_SECS", &default_window)
                .parse::<u64>()
                .map_err(|_| {
                    ConfigError::Invalid(
                        "TODOLIST_API_SYNC_WINDOW_SECS must be an integer in [1, 2592000]"
                            .to_string(),
                    )
                })?;
        if !(1..=2_592_000).contains(&sync_window_secs) {
            return Err(ConfigError::Invalid(
                "TODOLIST_API_SYNC_WINDOW_SECS must be in [1, 2592000]".to_string(),
            ));
        }

        let api_token = optional_trimmed(&lookup, "TODOLIST_API_TOKEN");
        let require_token = value_or_default(&lookup, "TODOLIST_API_REQUIRE_TOKEN", "false");
        if matches!(require_token.as_str(), "1" | "true" | "yes") && api_token.is_none() {
            return Err(ConfigError::MissingVar("TODOLIST_API_TOKEN"));
        }

        Ok(Self {
            bind_addr,
            sync_window: Duration::from_secs(sync_window_secs),
            api_token,
        })
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
