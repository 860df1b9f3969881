//! Markdown and JSON report generation.
//!
//! This module renders the analysis list (dashboard) and a single
//! analysis with its emotion insights (detail page).

use crate::analysis::{
    average_progress, generate_summary_text, seek_time, timeline_segments, EmotionInsights,
    StatusSummary, TimelineSegment,
};
use crate::models::{AnalysisDetail, AnalysisRecord, AnalysisStatus, Emotion};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Number of cells in the text timeline strip.
pub const TIMELINE_WIDTH: usize = 40;

/// The collection as written by `--format json`.
#[derive(Debug, Serialize)]
pub struct ListReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub summary: StatusSummary,
    pub analyses: &'a [AnalysisRecord],
}

/// One analysis as written by `--format json`.
#[derive(Debug, Serialize)]
pub struct DetailReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub analysis: &'a AnalysisDetail,
    pub insights: Option<EmotionInsights>,
    pub timeline: Vec<TimelineSegment>,
}

/// Generate the Markdown dashboard for a list of analyses.
pub fn generate_list_markdown(records: &[AnalysisRecord]) -> String {
    let mut output = String::new();
    let summary = StatusSummary::from_records(records);

    output.push_str("# Analyses\n\n");
    output.push_str(&generate_summary_section(&summary, records));

    if records.is_empty() {
        output.push_str("No analyses yet. Upload a video with `emolens upload <FILE>`.\n\n");
        output.push_str(&generate_footer());
        return output;
    }

    output.push_str("| Status | Title | ID | Progress |\n");
    output.push_str("|:---:|:---|:---|:---:|\n");
    for record in records {
        output.push_str(&generate_record_row(record));
    }
    output.push('\n');

    output.push_str(&generate_footer());
    output
}

/// Generate the summary section.
fn generate_summary_section(summary: &StatusSummary, records: &[AnalysisRecord]) -> String {
    let mut section = String::new();

    section.push_str(&format!("{}\n\n", generate_summary_text(summary)));

    if let Some(avg) = average_progress(records) {
        section.push_str(&format!(
            "- **In progress:** {} (average {:.0}%)\n\n",
            summary.processing, avg
        ));
    }

    section
}

fn generate_record_row(record: &AnalysisRecord) -> String {
    let progress = match record.status {
        AnalysisStatus::Processing => format!("{}%", record.progress),
        AnalysisStatus::Completed => "100%".to_string(),
        _ => "-".to_string(),
    };

    format!(
        "| {} {} | {} | `{}` | {} |\n",
        record.status.emoji(),
        record.status,
        escape_cell(&record.title),
        record.id,
        progress
    )
}

/// Generate the Markdown page for one analysis.
pub fn generate_detail_markdown(detail: &AnalysisDetail) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", detail.title));
    output.push_str(&generate_metadata_section(detail));

    if detail.status != AnalysisStatus::Completed {
        output.push_str("Emotion insights are available once the analysis completes.\n\n");
        output.push_str(&generate_footer());
        return output;
    }

    match EmotionInsights::from_frames(&detail.frames) {
        Some(insights) => {
            output.push_str(&generate_insights_section(&insights));
            output.push_str(&generate_timeline_section(detail));
        }
        None => output.push_str("No emotion data was recorded for this video.\n\n"),
    }

    output.push_str(&generate_footer());
    output
}

/// Generate the metadata section.
fn generate_metadata_section(detail: &AnalysisDetail) -> String {
    let mut section = String::new();

    section.push_str(&format!("- **ID:** `{}`\n", detail.id));
    section.push_str(&format!(
        "- **Status:** {} {}\n",
        detail.status.emoji(),
        detail.status
    ));
    if detail.status == AnalysisStatus::Processing {
        section.push_str(&format!("- **Progress:** {}%\n", detail.progress));
    }
    if let Some(duration) = detail.duration_seconds {
        section.push_str(&format!("- **Duration:** {}\n", format_time(duration)));
    }
    if !detail.frames.is_empty() {
        section.push_str(&format!("- **Frames:** {}\n", detail.frames.len()));
    }
    if let Some(ref url) = detail.video_url {
        section.push_str(&format!("- **Video:** {}\n", url));
    }
    section.push('\n');

    section
}

/// Generate the KPI and distribution section.
fn generate_insights_section(insights: &EmotionInsights) -> String {
    let mut section = String::new();

    section.push_str("## Insights\n\n");
    section.push_str("| Predominant emotion | Average confidence | Frames analyzed |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {:.1}% | {} |\n\n",
        insights.predominant, insights.average_confidence, insights.valid_frames
    ));

    section.push_str("### Emotion Distribution\n\n");
    section.push_str("| Emotion | Share |\n");
    section.push_str("|:---|:---:|\n");
    for (emotion, pct) in &insights.percentages {
        if *pct > 0.0 {
            section.push_str(&format!("| {} | {:.1}% |\n", emotion, pct));
        }
    }
    section.push('\n');

    section
}

/// Generate the text timeline strip with its legend.
fn generate_timeline_section(detail: &AnalysisDetail) -> String {
    let duration = effective_duration(detail);
    let segments = timeline_segments(&detail.frames, duration);
    if segments.is_empty() || duration <= 0.0 {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Timeline\n\n");
    section.push_str("```\n");
    section.push_str(&render_strip(&segments, duration, TIMELINE_WIDTH));
    section.push('\n');
    section.push_str(&format!(
        "0:00{}{}\n",
        " ".repeat(TIMELINE_WIDTH.saturating_sub(4 + format_time(duration).len())),
        format_time(duration)
    ));
    section.push_str("```\n\n");

    let legend: Vec<String> = Emotion::ALL
        .iter()
        .filter(|e| segments.iter().any(|s| s.emotion == Some(**e)))
        .map(|e| format!("`{}` {}", strip_char(Some(*e)), e))
        .collect();
    if !legend.is_empty() {
        section.push_str(&format!("{}\n\n", legend.join(" · ")));
    }

    section
}

/// Render segments into `width` cells, sampling the middle of each cell.
pub fn render_strip(segments: &[TimelineSegment], duration: f64, width: usize) -> String {
    (0..width)
        .map(|cell| {
            let t = seek_time((cell as f64 + 0.5) / width as f64, duration);
            let emotion = segments
                .iter()
                .find(|s| t >= s.start && t < s.end)
                .and_then(|s| s.emotion);
            strip_char(emotion)
        })
        .collect()
}

fn strip_char(emotion: Option<Emotion>) -> char {
    match emotion {
        Some(Emotion::Happy) => 'H',
        Some(Emotion::Sad) => 'S',
        Some(Emotion::Angry) => 'A',
        Some(Emotion::Surprised) => 'U',
        Some(Emotion::Neutral) => 'N',
        Some(Emotion::Fear) => 'F',
        Some(Emotion::Disgust) => 'D',
        Some(Emotion::Undefined) | None => '.',
    }
}

/// Reported duration, or the last frame's timestamp when the backend has
/// none.
fn effective_duration(detail: &AnalysisDetail) -> f64 {
    detail
        .duration_seconds
        .filter(|d| *d > 0.0)
        .or_else(|| detail.frames.last().map(|f| f.video_timestamp_sec))
        .unwrap_or(0.0)
}

/// Format seconds as `m:ss`.
pub fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Generate the report footer.
fn generate_footer() -> String {
    format!(
        "---\n\n*Generated by emolens {} on {}*\n",
        env!("CARGO_PKG_VERSION"),
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}

/// Generate a JSON rendering of the collection.
pub fn generate_list_json(records: &[AnalysisRecord]) -> Result<String> {
    let report = ListReport {
        generated_at: Utc::now(),
        summary: StatusSummary::from_records(records),
        analyses: records,
    };
    serde_json::to_string_pretty(&report).map_err(Into::into)
}

/// Generate a JSON rendering of one analysis with its insights.
pub fn generate_detail_json(detail: &AnalysisDetail) -> Result<String> {
    let report = DetailReport {
        generated_at: Utc::now(),
        analysis: detail,
        insights: EmotionInsights::from_frames(&detail.frames),
        timeline: timeline_segments(&detail.frames, effective_duration(detail)),
    };
    serde_json::to_string_pretty(&report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Frame;
    use serde_json::Map;

    fn frame(ts: f64, emotion: &str) -> Frame {
        Frame {
            video_timestamp_sec: ts,
            emotion: Some(emotion.to_string()),
            confidence: Some(0.8),
            ..Frame::default()
        }
    }

    fn create_test_detail() -> AnalysisDetail {
        AnalysisDetail {
            id: "42".to_string(),
            title: "Interview".to_string(),
            status: AnalysisStatus::Completed,
            progress: 100,
            duration_seconds: Some(4.0),
            frames: vec![frame(0.0, "HAPPY"), frame(2.0, "SAD"), frame(3.0, "HAPPY")],
            video_url: None,
            s3_key: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn test_generate_list_markdown() {
        let records = vec![
            AnalysisRecord::new("1", "First | take").with_status(AnalysisStatus::Processing, 30),
            AnalysisRecord::new("2", "Second").with_status(AnalysisStatus::Completed, 100),
        ];
        let markdown = generate_list_markdown(&records);

        assert!(markdown.contains("# Analyses"));
        assert!(markdown.contains("2 analyses"));
        assert!(markdown.contains("First \\| take"));
        assert!(markdown.contains("30%"));
        assert!(markdown.contains("average 30%"));
    }

    #[test]
    fn test_empty_list() {
        let markdown = generate_list_markdown(&[]);
        assert!(markdown.contains("No analyses yet"));
    }

    #[test]
    fn test_generate_detail_markdown() {
        let markdown = generate_detail_markdown(&create_test_detail());

        assert!(markdown.contains("# Interview"));
        assert!(markdown.contains("## Insights"));
        assert!(markdown.contains("| Happy | 80.0% | 3 |"));
        assert!(markdown.contains("| Sad | 33.3% |"));
        assert!(markdown.contains("## Timeline"));
        assert!(markdown.contains("0:04"));
    }

    #[test]
    fn test_detail_not_completed() {
        let mut detail = create_test_detail();
        detail.status = AnalysisStatus::Processing;
        detail.progress = 50;
        let markdown = generate_detail_markdown(&detail);

        assert!(markdown.contains("50%"));
        assert!(markdown.contains("once the analysis completes"));
        assert!(!markdown.contains("## Insights"));
    }

    #[test]
    fn test_render_strip() {
        let detail = create_test_detail();
        let segments = timeline_segments(&detail.frames, 4.0);
        assert_eq!(render_strip(&segments, 4.0, 4), "HHSH");
        assert_eq!(render_strip(&[], 4.0, 3), "...");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65.7), "1:05");
        assert_eq!(format_time(-3.0), "0:00");
    }

    #[test]
    fn test_generate_json_reports() {
        let detail = create_test_detail();
        let json = generate_detail_json(&detail).unwrap();
        assert!(json.contains("\"insights\""));
        assert!(json.contains("\"predominant\": \"HAPPY\""));
        assert!(json.contains("\"timeline\""));

        let list = generate_list_json(&[AnalysisRecord::new("1", "a")]).unwrap();
        assert!(list.contains("\"summary\""));
        assert!(list.contains("\"pending\": 1"));
    }
}
