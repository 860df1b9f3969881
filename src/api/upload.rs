//! Video upload flows.
//!
//! The backend either accepts the file directly as multipart form data
//! (`local` storage) or hands out a presigned object-storage URL that the
//! client writes to before asking the API to finalize and start analysis
//! (`s3` storage).

use crate::api::client::check_status;
use crate::api::ApiClient;
use crate::config::StorageMode;
use crate::error::ApiError;
use crate::models::{AnalysisRecord, UploadTicket};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Steps of an upload, reported to the caller for progress display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Initializing,
    Transferring,
    Finalizing,
}

impl UploadStage {
    pub fn message(&self) -> &'static str {
        match self {
            UploadStage::Initializing => "Starting upload...",
            UploadStage::Transferring => "Sending video...",
            UploadStage::Finalizing => "Upload complete, requesting analysis...",
        }
    }
}

/// A file to upload and the title to give its analysis.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub title: String,
    pub content_type: String,
}

impl UploadRequest {
    /// Build a request, defaulting the title to the file name without its
    /// final extension.
    pub fn new(path: impl Into<PathBuf>, title: Option<String>) -> Result<Self, ApiError> {
        let path = path.into();
        let title = match title {
            Some(t) if !t.trim().is_empty() => t.trim().to_string(),
            Some(_) => return Err(ApiError::InvalidInput("title cannot be empty".to_string())),
            None => default_title(&path).ok_or_else(|| {
                ApiError::InvalidInput("cannot derive a title from the file name".to_string())
            })?,
        };
        let content_type = content_type_for(&path).to_string();

        Ok(Self {
            path,
            title,
            content_type,
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string())
    }
}

/// File name minus the last extension, e.g. `team.sync.mp4` -> `team.sync`.
pub fn default_title(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy().trim().to_string();
    if stem.is_empty() {
        None
    } else {
        Some(stem)
    }
}

/// MIME type guessed from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "ogv" => "video/ogg",
        _ => "application/octet-stream",
    }
}

impl ApiClient {
    /// Upload a video and start its analysis, returning the new record.
    ///
    /// `on_stage` is called as the upload moves between steps.
    pub async fn upload_video<F>(
        &self,
        request: &UploadRequest,
        on_stage: F,
    ) -> Result<AnalysisRecord, ApiError>
    where
        F: Fn(UploadStage),
    {
        if !self.has_token() {
            return Err(ApiError::Unauthenticated);
        }

        on_stage(UploadStage::Initializing);
        let bytes = tokio::fs::read(&request.path).await?;
        info!(
            "Uploading {} ({} bytes) via {:?} storage",
            request.path.display(),
            bytes.len(),
            self.storage_mode()
        );

        match self.storage_mode() {
            StorageMode::Local => self.upload_multipart(request, bytes, &on_stage).await,
            StorageMode::S3 => self.upload_presigned(request, bytes, &on_stage).await,
        }
    }

    async fn upload_multipart<F>(
        &self,
        request: &UploadRequest,
        bytes: Vec<u8>,
        on_stage: &F,
    ) -> Result<AnalysisRecord, ApiError>
    where
        F: Fn(UploadStage),
    {
        let part = Part::bytes(bytes)
            .file_name(request.file_name())
            .mime_str(&request.content_type)
            .map_err(|e| ApiError::InvalidInput(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("title", request.title.clone());

        on_stage(UploadStage::Transferring);
        let builder = self.authorized(self.http.post(self.url("/videos/upload")).multipart(form))?;
        self.send_json(builder).await
    }

    async fn upload_presigned<F>(
        &self,
        request: &UploadRequest,
        bytes: Vec<u8>,
        on_stage: &F,
    ) -> Result<AnalysisRecord, ApiError>
    where
        F: Fn(UploadStage),
    {
        let builder = self.authorized(
            self.http
                .post(self.url("/videos/upload"))
                .json(&json!({ "filename": request.file_name() })),
        )?;
        let ticket: UploadTicket = self.send_json(builder).await?;
        debug!("Received upload ticket for key {}", ticket.s3_key);

        // The presigned URL carries its own credentials; no bearer token here.
        on_stage(UploadStage::Transferring);
        let put = self
            .http
            .put(&ticket.upload_url)
            .header(CONTENT_TYPE, request.content_type.as_str())
            .body(bytes)
            .send()
            .await?;
        check_status(put).await?;

        on_stage(UploadStage::Finalizing);
        let builder = self.authorized(
            self.http
                .post(self.url("/videos/upload/finalize"))
                .json(&json!({ "s3_key": ticket.s3_key, "title": request.title })),
        )?;
        self.send_json(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;

    #[test]
    fn test_default_title_strips_last_extension() {
        assert_eq!(default_title(Path::new("clip.mp4")).as_deref(), Some("clip"));
        assert_eq!(
            default_title(Path::new("/tmp/team.sync.mov")).as_deref(),
            Some("team.sync")
        );
        assert_eq!(default_title(Path::new("noext")).as_deref(), Some("noext"));
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("a.MP4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("a.mov")), "video/quicktime");
        assert_eq!(content_type_for(Path::new("a.bin")), "application/octet-stream");
    }

    #[test]
    fn test_upload_request_titles() {
        let req = UploadRequest::new("/videos/interview.webm", None).unwrap();
        assert_eq!(req.title, "interview");
        assert_eq!(req.content_type, "video/webm");
        assert_eq!(req.file_name(), "interview.webm");

        let req = UploadRequest::new("x.mp4", Some("  Pitch  ".to_string())).unwrap();
        assert_eq!(req.title, "Pitch");

        assert!(UploadRequest::new("x.mp4", Some("   ".to_string())).is_err());
    }

    #[tokio::test]
    async fn test_upload_requires_token() {
        let client = ApiClient::new(&ApiConfig::default()).unwrap();
        let req = UploadRequest::new("missing.mp4", None).unwrap();
        let err = client.upload_video(&req, |_| {}).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
    }
}
