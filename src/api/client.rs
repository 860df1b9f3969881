//! HTTP implementation of the backend endpoints.

use crate::api::VideoBackend;
use crate::config::{ApiConfig, StorageMode};
use crate::error::ApiError;
use crate::models::{AnalysisDetail, AnalysisRecord};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// REST client bound to one API base URL.
///
/// Cloning is cheap and clones share the bearer token, so a login through
/// one handle authenticates every other handle.
#[derive(Clone)]
pub struct ApiClient {
    pub(crate) http: reqwest::Client,
    base_url: String,
    storage_mode: StorageMode,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    /// Create a client from the `[api]` configuration section.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            storage_mode: config.storage_mode,
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn storage_mode(&self) -> StorageMode {
        self.storage_mode
    }

    /// Attach a bearer token to every subsequent call.
    pub fn set_token(&self, token: impl Into<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = Some(token.into());
        }
    }

    pub fn clear_token(&self) {
        if let Ok(mut guard) = self.token.write() {
            *guard = None;
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.read().map(|t| t.is_some()).unwrap_or(false)
    }

    /// Current bearer token, for side channels such as the event stream.
    pub fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Adds the bearer header, refusing to build the request without one.
    pub(crate) fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let token = self.token().ok_or(ApiError::Unauthenticated)?;
        Ok(builder.bearer_auth(token))
    }

    /// Send a request and decode a JSON body, mapping non-2xx to `ApiError::Http`.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = check_status(builder.send().await?).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Send a request whose response body is not needed.
    pub(crate) async fn send_empty(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        check_status(builder.send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl VideoBackend for ApiClient {
    async fn list_videos(&self) -> Result<Vec<AnalysisRecord>, ApiError> {
        debug!("GET /videos/");
        let request = self.authorized(self.http.get(self.url("/videos/")))?;
        self.send_json(request).await
    }

    async fn get_video(&self, id: &str) -> Result<AnalysisDetail, ApiError> {
        debug!("GET /videos/{}", id);
        let request = self.authorized(self.http.get(self.url(&format!("/videos/{}", id))))?;
        let mut detail: AnalysisDetail = self.send_json(request).await?;

        if self.storage_mode == StorageMode::Local {
            if let Some(ref key) = detail.s3_key {
                detail.video_url = Some(stream_url(&self.base_url, key));
            }
        }

        Ok(detail)
    }

    async fn update_title(&self, id: &str, title: &str) -> Result<(), ApiError> {
        debug!("PATCH /videos/{}", id);
        let request = self.authorized(
            self.http
                .patch(self.url(&format!("/videos/{}", id)))
                .json(&json!({ "title": title })),
        )?;
        self.send_empty(request).await
    }
}

/// Turn a non-2xx response into `ApiError::Http` with the server's message.
pub(crate) async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Http {
        status: status.as_u16(),
        message: extract_error_message(&body),
    })
}

/// Pull a human-readable message out of an error body.
///
/// Looks at the JSON `error` field, then `message`, then `msg`; plain-text
/// bodies are used as-is. Returns an empty string when nothing usable exists.
pub fn extract_error_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => ["error", "message", "msg"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_default(),
        Ok(_) => String::new(),
        Err(_) if trimmed.starts_with('<') => String::new(),
        Err(_) => trimmed.to_string(),
    }
}

/// Playback URL for locally stored videos: the last path segment of the
/// storage key served from the stream endpoint.
pub fn stream_url(base_url: &str, s3_key: &str) -> String {
    let filename = s3_key.rsplit('/').next().unwrap_or(s3_key);
    format!("{}/videos/stream/{}", base_url.trim_end_matches('/'), filename)
}
