//! Data models for the analysis client.
//!
//! This module contains the wire and domain types shared by the REST
//! client, the collection store, the push channel and the renderers.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Processing status of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnalysisStatus {
    /// Uploaded, waiting for a worker
    #[default]
    #[serde(alias = "pending")]
    Pending,
    /// A worker is extracting frames and classifying them
    #[serde(alias = "processing")]
    Processing,
    /// Results are available
    #[serde(alias = "completed")]
    Completed,
    /// Processing gave up
    #[serde(alias = "failed")]
    Failed,
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisStatus::Pending => write!(f, "PENDING"),
            AnalysisStatus::Processing => write!(f, "PROCESSING"),
            AnalysisStatus::Completed => write!(f, "COMPLETED"),
            AnalysisStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl AnalysisStatus {
    /// Position along `PENDING -> PROCESSING -> {COMPLETED, FAILED}`.
    pub fn rank(&self) -> u8 {
        match self {
            AnalysisStatus::Pending => 0,
            AnalysisStatus::Processing => 1,
            AnalysisStatus::Completed | AnalysisStatus::Failed => 2,
        }
    }

    /// Returns true for `COMPLETED` and `FAILED`.
    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }

    /// Whether a record currently in `self` may move to `next`.
    ///
    /// Repeating the current status is allowed so that progress updates
    /// within `PROCESSING` go through.
    pub fn can_transition_to(&self, next: AnalysisStatus) -> bool {
        if *self == next {
            return true;
        }
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// Returns an emoji representation of the status.
    pub fn emoji(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "🕓",
            AnalysisStatus::Processing => "⚙️",
            AnalysisStatus::Completed => "✅",
            AnalysisStatus::Failed => "❌",
        }
    }
}

/// One uploaded video's processing job, as kept in the collection.
///
/// Server-owned fields the client does not interpret are kept in `extra`
/// and serialized back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: AnalysisStatus,
    #[serde(default, deserialize_with = "deserialize_progress")]
    pub progress: u8,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnalysisRecord {
    /// Creates a record with no server-owned payload.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: AnalysisStatus::Pending,
            progress: 0,
            extra: Map::new(),
        }
    }

    /// Builder-style status setter.
    pub fn with_status(mut self, status: AnalysisStatus, progress: u8) -> Self {
        self.status = status;
        self.progress = progress.min(100);
        self
    }
}

/// A `processing_update` push event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    #[serde(alias = "id", deserialize_with = "deserialize_id")]
    pub video_id: String,
    pub status: AnalysisStatus,
    #[serde(default, deserialize_with = "deserialize_progress")]
    pub progress: u8,
}

impl StatusEvent {
    pub fn new(video_id: impl Into<String>, status: AnalysisStatus, progress: u8) -> Self {
        Self {
            video_id: video_id.into(),
            status,
            progress: progress.min(100),
        }
    }
}

/// Full analysis data returned by `GET /videos/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDetail {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: AnalysisStatus,
    #[serde(default, deserialize_with = "deserialize_progress")]
    pub progress: u8,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub frames: Vec<Frame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_key: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single classified video frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default)]
    pub video_timestamp_sec: f64,
    /// Single-label classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Multi-label classification, parallel to `confidences`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emotions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub confidences: Vec<f64>,
}

/// Emotion classes produced by the backend model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Surprised,
    Neutral,
    Fear,
    Disgust,
    Undefined,
}

impl Emotion {
    /// Canonical ordering used by every chart and KPI.
    pub const ALL: [Emotion; 8] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Surprised,
        Emotion::Neutral,
        Emotion::Fear,
        Emotion::Disgust,
        Emotion::Undefined,
    ];

    /// Case-insensitive parse of a backend label.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "HAPPY" => Some(Emotion::Happy),
            "SAD" => Some(Emotion::Sad),
            "ANGRY" => Some(Emotion::Angry),
            "SURPRISED" => Some(Emotion::Surprised),
            "NEUTRAL" => Some(Emotion::Neutral),
            "FEAR" => Some(Emotion::Fear),
            "DISGUST" => Some(Emotion::Disgust),
            "UNDEFINED" => Some(Emotion::Undefined),
            _ => None,
        }
    }

    /// Chart colour for this emotion.
    pub fn color(&self) -> &'static str {
        match self {
            Emotion::Happy => "#4caf50",
            Emotion::Sad => "#2196f3",
            Emotion::Angry => "#f44336",
            Emotion::Surprised => "#ff9800",
            Emotion::Neutral => "#9e9e9e",
            Emotion::Fear => "#9c27b0",
            Emotion::Disgust => "#cddc39",
            Emotion::Undefined => "#607d8b",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Emotion::Happy => write!(f, "Happy"),
            Emotion::Sad => write!(f, "Sad"),
            Emotion::Angry => write!(f, "Angry"),
            Emotion::Surprised => write!(f, "Surprised"),
            Emotion::Neutral => write!(f, "Neutral"),
            Emotion::Fear => write!(f, "Fear"),
            Emotion::Disgust => write!(f, "Disgust"),
            Emotion::Undefined => write!(f, "Undefined"),
        }
    }
}

/// Authenticated account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// Login / register payload.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub email: String,
    pub password: String,
}

/// Response of `POST /auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Presigned upload target returned by the upload initialisation call.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadTicket {
    pub upload_url: String,
    pub s3_key: String,
}

/// Accepts string or numeric identifiers and normalises them to a string.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// Accepts integer, float or null progress values, clamped to 0..=100.
fn deserialize_progress<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let pct = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(pct.round().clamp(0.0, 100.0) as u8)
}
