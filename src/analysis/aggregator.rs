//! Collection aggregation and statistics.
//!
//! This module provides utilities for summarising the analysis list shown
//! on the dashboard.

use crate::models::{AnalysisRecord, AnalysisStatus};
use serde::Serialize;
use std::collections::HashMap;

/// Counts of records per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusSummary {
    /// Creates a summary from a list of records.
    pub fn from_records(records: &[AnalysisRecord]) -> Self {
        let mut summary = Self {
            total: records.len(),
            ..Self::default()
        };

        for record in records {
            match record.status {
                AnalysisStatus::Pending => summary.pending += 1,
                AnalysisStatus::Processing => summary.processing += 1,
                AnalysisStatus::Completed => summary.completed += 1,
                AnalysisStatus::Failed => summary.failed += 1,
            }
        }

        summary
    }

    /// Records that have not reached a terminal status.
    pub fn in_flight(&self) -> usize {
        self.pending + self.processing
    }
}

/// Group records by status, preserving collection order within each group.
pub fn group_by_status(records: &[AnalysisRecord]) -> HashMap<AnalysisStatus, Vec<AnalysisRecord>> {
    let mut grouped: HashMap<AnalysisStatus, Vec<AnalysisRecord>> = HashMap::new();

    for record in records {
        grouped.entry(record.status).or_default().push(record.clone());
    }

    grouped
}

/// Mean progress of the records currently processing, if any.
pub fn average_progress(records: &[AnalysisRecord]) -> Option<f64> {
    let processing: Vec<u8> = records
        .iter()
        .filter(|r| r.status == AnalysisStatus::Processing)
        .map(|r| r.progress)
        .collect();

    if processing.is_empty() {
        return None;
    }

    let sum: u32 = processing.iter().map(|p| *p as u32).sum();
    Some(sum as f64 / processing.len() as f64)
}

/// Generate a one-line text summary of the collection.
pub fn generate_summary_text(summary: &StatusSummary) -> String {
    format!(
        "{} analyses: {} {} pending | {} {} processing | {} {} completed | {} {} failed",
        summary.total,
        AnalysisStatus::Pending.emoji(),
        summary.pending,
        AnalysisStatus::Processing.emoji(),
        summary.processing,
        AnalysisStatus::Completed.emoji(),
        summary.completed,
        AnalysisStatus::Failed.emoji(),
        summary.failed,
    )
}
