//! Full-data view of one analysis.
//!
//! Push events only carry status and progress. When the store reports that
//! this view's record just completed, the view refetches the frames and
//! duration from the backend.

use crate::api::VideoBackend;
use crate::error::StoreError;
use crate::models::{AnalysisDetail, AnalysisStatus};
use crate::store::AnalysisCollectionStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Message shown when the detail fetch fails.
pub const DETAIL_FAILED_MESSAGE: &str = "Could not load the details of this analysis.";

pub struct DetailView {
    id: String,
    backend: Arc<dyn VideoBackend>,
    store: AnalysisCollectionStore,
    detail: Option<AnalysisDetail>,
    error: Option<String>,
}

impl DetailView {
    pub fn new(
        id: impl Into<String>,
        backend: Arc<dyn VideoBackend>,
        store: AnalysisCollectionStore,
    ) -> Self {
        Self {
            id: id.into(),
            backend,
            store,
            detail: None,
            error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn detail(&self) -> Option<&AnalysisDetail> {
        self.detail.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Fetch the full record. A failure keeps the previously loaded data.
    pub async fn load(&mut self) -> Result<&AnalysisDetail, StoreError> {
        debug!("Loading detail for {}", self.id);
        match self.backend.get_video(&self.id).await {
            Ok(detail) => {
                self.error = None;
                let detail = self.detail.insert(detail);
                Ok(&*detail)
            }
            Err(e) => {
                warn!("Failed to load detail for {}: {}", self.id, e);
                self.error = Some(DETAIL_FAILED_MESSAGE.to_string());
                Err(StoreError::Fetch {
                    message: DETAIL_FAILED_MESSAGE.to_string(),
                    source: e,
                })
            }
        }
    }

    /// Refetch if this record is the one that just completed.
    ///
    /// Returns `Ok(true)` when a refetch happened.
    pub async fn refresh_if_completed(&mut self) -> Result<bool, StoreError> {
        if !self.store.consume_just_completed_for(&self.id) {
            return Ok(false);
        }
        info!("Analysis {} completed, reloading full data", self.id);
        self.load().await?;
        Ok(true)
    }

    /// Keep status and progress in line with the store between refetches.
    pub fn sync_status(&mut self) {
        if let (Some(detail), Some(record)) = (self.detail.as_mut(), self.store.get(&self.id)) {
            detail.status = record.status;
            detail.progress = record.progress;
        }
    }

    /// Catch up with the store after it changed.
    ///
    /// Returns `Ok(true)` once the record is terminal. Full data is
    /// refetched on completion whether it was announced by a push event or
    /// only showed up through a refresh of the collection.
    pub async fn update_from_store(&mut self) -> Result<bool, StoreError> {
        if self.refresh_if_completed().await? {
            return Ok(true);
        }

        let before = self.detail.as_ref().map(|d| d.status);
        self.sync_status();
        let Some(status) = self.detail.as_ref().map(|d| d.status) else {
            return Ok(false);
        };

        if status == AnalysisStatus::Completed && before != Some(AnalysisStatus::Completed) {
            info!("Analysis {} completed, reloading full data", self.id);
            self.load().await?;
        }
        Ok(status.is_terminal())
    }

    /// Rename the analysis.
    ///
    /// Goes through the store when the record is cached there so the list
    /// and this view agree; otherwise talks to the backend directly. Either
    /// way the local title is restored on failure.
    pub async fn rename(&mut self, new_title: &str) -> Result<(), StoreError> {
        let Some(previous) = self.detail.as_ref().map(|d| d.title.clone()) else {
            return Err(StoreError::UnknownRecord(self.id.clone()));
        };
        if previous == new_title {
            return Ok(());
        }
        self.set_title(new_title);

        let result = if self.store.get(&self.id).is_some() {
            self.store.update_title(&self.id, new_title).await
        } else {
            self.backend
                .update_title(&self.id, new_title)
                .await
                .map_err(StoreError::mutation)
        };

        if let Err(e) = result {
            self.set_title(&previous);
            return Err(e);
        }
        Ok(())
    }

    fn set_title(&mut self, title: &str) {
        if let Some(detail) = self.detail.as_mut() {
            detail.title = title.to_string();
        }
    }
}
