//! HTTP implementation of the remote client.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;

use super::wire::{EntryFields, EntryList, RemoteEntry, RemoteResponse};
use super::RemoteClient;
use crate::config::{has_http_scheme, non_blank, ClientConfig};
use crate::error::{SyncError, SyncResult};

const JSON_MIME: &str = "application/json";
const FORM_MIME: &str = "application/x-www-form-urlencoded";
/// Longest response excerpt carried into logs and errors
const EXCERPT_CHARS: usize = 180;

/// Opaque credential injection applied to every outgoing request
pub trait RequestAuthenticator: Send + Sync {
    fn authenticate(&self, request: RequestBuilder) -> RequestBuilder;
}

/// Static bearer token credentials
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("BearerToken")
            .field(&"[REDACTED]")
            .finish()
    }
}

impl RequestAuthenticator for BearerToken {
    fn authenticate(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.0)
    }
}

/// Client for the `/entries` REST resource
#[derive(Clone)]
pub struct HttpRemoteClient {
    entries_url: String,
    client: reqwest::Client,
    authenticator: Option<Arc<dyn RequestAuthenticator>>,
}

impl fmt::Debug for HttpRemoteClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HttpRemoteClient")
            .field("entries_url", &self.entries_url)
            .field("authenticated", &self.authenticator.is_some())
            .finish_non_exhaustive()
    }
}

impl HttpRemoteClient {
    /// Create a client for the service rooted at `base_url`.
    ///
    /// `timeout` bounds each request; expiry surfaces as a network error.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| SyncError::InvalidRequest(error.to_string()))?;

        Ok(Self {
            entries_url: format!("{base_url}/entries"),
            client,
            authenticator: None,
        })
    }

    /// Build a client from runtime configuration, attaching the auth token
    pub fn from_config(config: &ClientConfig) -> SyncResult<Self> {
        let server_url = config.server_url.clone().ok_or_else(|| {
            SyncError::InvalidRequest("no server URL configured".to_string())
        })?;
        let client = Self::new(server_url, config.request_timeout)?;
        Ok(match config.auth_token.clone() {
            Some(token) => client.with_authenticator(BearerToken::new(token)),
            None => client,
        })
    }

    #[must_use]
    pub fn with_authenticator(mut self, authenticator: impl RequestAuthenticator + 'static) -> Self {
        self.authenticator = Some(Arc::new(authenticator));
        self
    }

    pub fn entries_url(&self) -> &str {
        &self.entries_url
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self.client.request(method, url).header(ACCEPT, JSON_MIME);
        match &self.authenticator {
            Some(authenticator) => authenticator.authenticate(request),
            None => request,
        }
    }

    fn entry_url(&self, remote_id: i64) -> String {
        format!("{}/{remote_id}", self.entries_url)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> SyncResult<RemoteResponse<T>> {
        let response = request.send().await?;
        let status = response.status().as_u16();

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status, body = %excerpt(&body), "Remote request rejected");
            return Ok(RemoteResponse::rejected(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with(JSON_MIME) {
            return Err(SyncError::InvalidResponse(format!(
                "unsupported content type '{content_type}' (HTTP {status})"
            )));
        }

        let body = response.text().await?;
        let payload = serde_json::from_str::<T>(&body).map_err(|error| {
            SyncError::InvalidResponse(format!("{error}: {}", excerpt(&body)))
        })?;
        Ok(RemoteResponse::new(status, Some(payload)))
    }

    async fn execute_empty(&self, request: RequestBuilder) -> SyncResult<RemoteResponse<()>> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        if response.status().is_success() {
            Ok(RemoteResponse::new(status, Some(())))
        } else {
            Ok(RemoteResponse::rejected(status))
        }
    }

    fn with_fields(request: RequestBuilder, fields: &EntryFields) -> RequestBuilder {
        request.header(CONTENT_TYPE, FORM_MIME).body(fields.encode())
    }
}

impl RemoteClient for HttpRemoteClient {
    async fn list_entries(&self, since: Option<f64>) -> SyncResult<RemoteResponse<EntryList>> {
        let mut request = self.request(Method::GET, &self.entries_url);
        if let Some(since) = since {
            request = request.query(&[("modified", format!("{since:.6}"))]);
        }
        let response = self.execute::<EntryList>(request).await?;
        if let Some(list) = &response.body {
            tracing::debug!(count = list.entries.len(), "Retrieved remote entries");
        }
        Ok(response)
    }

    async fn create_entry(&self, fields: &EntryFields) -> SyncResult<RemoteResponse<RemoteEntry>> {
        let request = Self::with_fields(self.request(Method::POST, &self.entries_url), fields);
        self.execute(request).await
    }

    async fn replace_entry(
        &self,
        remote_id: i64,
        fields: &EntryFields,
    ) -> SyncResult<RemoteResponse<RemoteEntry>> {
        let url = self.entry_url(remote_id);
        let request = Self::with_fields(self.request(Method::PUT, &url), fields);
        self.execute(request).await
    }

    async fn delete_entry(&self, remote_id: i64) -> SyncResult<RemoteResponse<()>> {
        let url = self.entry_url(remote_id);
        self.execute_empty(self.request(Method::DELETE, &url)).await
    }
}

fn normalize_base_url(raw: String) -> SyncResult<String> {
    let url = non_blank(Some(raw))
        .ok_or_else(|| SyncError::InvalidRequest("server URL must not be empty".to_string()))?;
    if has_http_scheme(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(SyncError::InvalidRequest(
            "server URL must include http:// or https://".to_string(),
        ))
    }
}

fn excerpt(body: &str) -> String {
    body.trim().chars().take(EXCERPT_CHARS).collect()
}
