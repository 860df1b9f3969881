//! In-memory backend used by unit tests.

use crate::api::VideoBackend;
use crate::error::ApiError;
use crate::models::{AnalysisDetail, AnalysisRecord};
use async_trait::async_trait;
use serde_json::Map;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Default)]
pub struct FakeBackend {
    records: Mutex<Vec<AnalysisRecord>>,
    details: Mutex<HashMap<String, AnalysisDetail>>,
    fail_list: AtomicBool,
    fail_detail: AtomicBool,
    update_error: Mutex<Option<ApiError>>,
    titles: Mutex<Vec<(String, String)>>,
    list_calls: AtomicUsize,
    detail_calls: AtomicUsize,
    update_calls: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
    update_started: Notify,
    list_gate: Mutex<Option<Arc<Notify>>>,
    list_started: Notify,
}

impl FakeBackend {
    pub fn with_records(records: Vec<AnalysisRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn set_records(&self, records: Vec<AnalysisRecord>) {
        *self.records.lock().unwrap() = records;
    }

    pub fn insert_detail(&self, detail: AnalysisDetail) {
        self.details.lock().unwrap().insert(detail.id.clone(), detail);
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_detail(&self, fail: bool) {
        self.fail_detail.store(fail, Ordering::SeqCst);
    }

    /// Every later title update fails with a copy of `error`'s message.
    pub fn fail_updates_with(&self, error: ApiError) {
        *self.update_error.lock().unwrap() = Some(error);
    }

    /// Park title updates until the returned handle is notified.
    pub fn hold_updates(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Park the next list request after it has read the records, so the
    /// response it returns is stale by the time the handle is notified.
    pub fn hold_next_list(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.list_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Resolves once a held list request has reached the backend.
    pub async fn wait_for_list(&self) {
        self.list_started.notified().await;
    }

    /// Resolves once an update request has reached the backend.
    pub async fn wait_for_update(&self) {
        self.update_started.notified().await;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn titles(&self) -> Vec<(String, String)> {
        self.titles.lock().unwrap().clone()
    }
}

fn clone_error(error: &ApiError) -> ApiError {
    match error {
        ApiError::Http { status, message } => ApiError::Http {
            status: *status,
            message: message.clone(),
        },
        ApiError::Unauthenticated => ApiError::Unauthenticated,
        other => ApiError::Transport(other.to_string()),
    }
}

#[async_trait]
impl VideoBackend for FakeBackend {
    async fn list_videos(&self) -> Result<Vec<AnalysisRecord>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail_list.load(Ordering::SeqCst) {
            Err(ApiError::Transport("connection refused".to_string()))
        } else {
            Ok(self.records.lock().unwrap().clone())
        };
        let gate = self.list_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            self.list_started.notify_one();
            gate.notified().await;
        }
        result
    }

    async fn get_video(&self, id: &str) -> Result<AnalysisDetail, ApiError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_detail.load(Ordering::SeqCst) {
            return Err(ApiError::Transport("connection refused".to_string()));
        }
        self.details
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(ApiError::Http {
                status: 404,
                message: "Video not found".to_string(),
            })
    }

    async fn update_title(&self, id: &str, title: &str) -> Result<(), ApiError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.update_started.notify_one();

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(ref error) = *self.update_error.lock().unwrap() {
            return Err(clone_error(error));
        }
        self.titles
            .lock()
            .unwrap()
            .push((id.to_string(), title.to_string()));
        if let Some(record) = self.records.lock().unwrap().iter_mut().find(|r| r.id == id) {
            record.title = title.to_string();
        }
        Ok(())
    }
}

/// Detail fixture with no frames.
pub fn detail(id: &str, title: &str) -> AnalysisDetail {
    AnalysisDetail {
        id: id.to_string(),
        title: title.to_string(),
        status: Default::default(),
        progress: 0,
        duration_seconds: None,
        frames: Vec::new(),
        video_url: None,
        s3_key: None,
        extra: Map::new(),
    }
}
