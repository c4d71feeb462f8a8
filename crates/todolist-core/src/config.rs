//! Runtime configuration for sync clients.
//!
//! Values come from environment variables (or any lookup function, for
//! tests). Front ends may layer their own persisted settings on top using the
//! `with_*` builders.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_LAZY_SYNC_DELAY: Duration = Duration::from_millis(5000);

/// Settings shared by every sync client
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Service root, e.g. `https://todo.example.com/todolist`
    pub server_url: Option<String>,
    pub auth_token: Option<String>,
    /// Per-request timeout of the HTTP client
    pub request_timeout: Duration,
    /// Suppress every scheduled sync
    pub offline_mode: bool,
    /// Debounce applied to sync requests that follow local edits
    pub lazy_sync_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            auth_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            offline_mode: false,
            lazy_sync_delay: DEFAULT_LAZY_SYNC_DELAY,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ClientConfig")
            .field("server_url", &self.server_url)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout", &self.request_timeout)
            .field("offline_mode", &self.offline_mode)
            .field("lazy_sync_delay", &self.lazy_sync_delay)
            .finish()
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let server_url = optional_trimmed(&lookup, "TODOLIST_SERVER_URL");
        if let Some(url) = &server_url {
            validate_server_url(url)?;
        }

        let auth_token = optional_trimmed(&lookup, "TODOLIST_AUTH_TOKEN");

        let request_timeout_secs = optional_trimmed(&lookup, "TODOLIST_HTTP_TIMEOUT_SECS")
            .map(|value| {
                value.parse::<u64>().map_err(|_| {
                    Error::InvalidInput(
                        "TODOLIST_HTTP_TIMEOUT_SECS must be an integer in [1, 300]".to_string(),
                    )
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT.as_secs());
        if !(1..=300).contains(&request_timeout_secs) {
            return Err(Error::InvalidInput(
                "TODOLIST_HTTP_TIMEOUT_SECS must be in [1, 300]".to_string(),
            ));
        }

        let offline_mode = optional_trimmed(&lookup, "TODOLIST_OFFLINE")
            .map(|value| parse_flag("TODOLIST_OFFLINE", &value))
            .transpose()?
            .unwrap_or(false);

        let lazy_sync_ms = optional_trimmed(&lookup, "TODOLIST_LAZY_SYNC_MS")
            .map(|value| {
                value.parse::<u64>().map_err(|_| {
                    Error::InvalidInput("TODOLIST_LAZY_SYNC_MS must be an integer".to_string())
                })
            })
            .transpose()?
            .unwrap_or(5000);

        Ok(Self {
            server_url,
            auth_token,
            request_timeout: Duration::from_secs(request_timeout_secs),
            offline_mode,
            lazy_sync_delay: Duration::from_millis(lazy_sync_ms),
        })
    }

    /// Set the server URL, validating its scheme
    pub fn with_server_url(mut self, url: impl Into<String>) -> Result<Self> {
        let url = non_blank(Some(url.into()))
            .ok_or_else(|| Error::InvalidInput("server URL must not be empty".to_string()))?;
        validate_server_url(&url)?;
        self.server_url = Some(url);
        Ok(self)
    }

    #[must_use]
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = non_blank(token);
        self
    }

    #[must_use]
    pub const fn with_offline_mode(mut self, offline: bool) -> Self {
        self.offline_mode = offline;
        self
    }

    /// Whether a sync can be attempted at all
    pub const fn is_configured(&self) -> bool {
        self.server_url.is_some()
    }
}

/// Trimmed text, or `None` when nothing is left
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn has_http_scheme(url: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

fn validate_server_url(url: &str) -> Result<()> {
    if has_http_scheme(url) {
        Ok(())
    } else {
        Err(Error::InvalidInput(
            "TODOLIST_SERVER_URL must start with http:// or https://".to_string(),
        ))
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidInput(format!("{name} must be a boolean"))),
    }
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    non_blank(lookup(name))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ClientConfig> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        ClientConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn config_defaults_without_env() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert!(!config.is_configured());
    }

    #[test]
    fn config_reads_all_values() {
        let config = config_from(&[
            ("TODOLIST_SERVER_URL", " https://todo.example.com/todolist "),
            ("TODOLIST_AUTH_TOKEN", "secret"),
            ("TODOLIST_HTTP_TIMEOUT_SECS", "3"),
            ("TODOLIST_OFFLINE", "yes"),
            ("TODOLIST_LAZY_SYNC_MS", "250"),
        ])
        .unwrap();

        assert_eq!(
            config.server_url.as_deref(),
            Some("https://todo.example.com/todolist")
        );
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert!(config.offline_mode);
        assert_eq!(config.lazy_sync_delay, Duration::from_millis(250));
    }

    #[test]
    fn config_rejects_invalid_values() {
        assert!(config_from(&[("TODOLIST_SERVER_URL", "todo.example.com")]).is_err());
        assert!(config_from(&[("TODOLIST_HTTP_TIMEOUT_SECS", "0")]).is_err());
        assert!(config_from(&[("TODOLIST_HTTP_TIMEOUT_SECS", "soon")]).is_err());
        assert!(config_from(&[("TODOLIST_OFFLINE", "maybe")]).is_err());
    }

    #[test]
    fn blank_values_are_dropped() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some(" \t ".to_string())), None);
        assert_eq!(non_blank(Some(" token ".to_string())).as_deref(), Some("token"));
    }

    #[test]
    fn server_urls_need_http_scheme() {
        assert!(has_http_scheme("http://localhost:8080/todolist"));
        assert!(has_http_scheme("https://todo.example.com"));
        assert!(!has_http_scheme("ftp://todo.example.com"));
        assert!(!has_http_scheme("todo.example.com"));
    }

    #[test]
    fn config_redacts_auth_token() {
        let config = ClientConfig::default().with_auth_token(Some("secret".to_string()));
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
