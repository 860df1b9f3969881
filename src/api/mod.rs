//! REST client for the analysis backend.
//!
//! `VideoBackend` is the seam the collection store and the detail view
//! depend on; `ApiClient` is the HTTP implementation.

pub mod auth;
pub mod client;
pub mod upload;

use crate::error::ApiError;
use crate::models::{AnalysisDetail, AnalysisRecord};
use async_trait::async_trait;

pub use client::ApiClient;
pub use upload::{UploadRequest, UploadStage};

/// Video endpoints consumed by the store.
#[async_trait]
pub trait VideoBackend: Send + Sync {
    /// `GET /videos/` for the authenticated user, most recent first.
    async fn list_videos(&self) -> Result<Vec<AnalysisRecord>, ApiError>;

    /// `GET /videos/{id}` including frames and media locator.
    async fn get_video(&self, id: &str) -> Result<AnalysisDetail, ApiError>;

    /// `PATCH /videos/{id}` with a new title.
    async fn update_title(&self, id: &str, title: &str) -> Result<(), ApiError>;
}
