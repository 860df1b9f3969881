//! Emotion timeline segments.

use crate::analysis::insights::frame_label;
use crate::models::{Emotion, Frame};
use serde::Serialize;

/// Stretch of video attributed to one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineSegment {
    pub start: f64,
    pub end: f64,
    pub emotion: Option<Emotion>,
    /// Share of the total duration, 0-100.
    pub width_percent: f64,
}

/// One segment per frame, running from its timestamp to the next frame's
/// (the last one runs to `duration`).
pub fn timeline_segments(frames: &[Frame], duration: f64) -> Vec<TimelineSegment> {
    frames
        .iter()
        .enumerate()
        .map(|(i, frame)| {
            let start = frame.video_timestamp_sec;
            let end = frames
                .get(i + 1)
                .map(|next| next.video_timestamp_sec)
                .unwrap_or(duration);
            let span = (end - start).max(0.0);
            let width_percent = if duration > 0.0 {
                span / duration * 100.0
            } else {
                0.0
            };

            TimelineSegment {
                start,
                end,
                emotion: frame_label(frame),
                width_percent,
            }
        })
        .collect()
}

/// Video position for a click at `fraction` of the timeline's width.
pub fn seek_time(fraction: f64, duration: f64) -> f64 {
    if !fraction.is_finite() || duration <= 0.0 {
        return 0.0;
    }
    fraction.clamp(0.0, 1.0) * duration
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ts: f64, emotion: &str) -> Frame {
        Frame {
            video_timestamp_sec: ts,
            emotions: vec![emotion.to_string()],
            confidences: vec![1.0],
            ..Frame::default()
        }
    }

    #[test]
    fn test_segments_cover_duration() {
        let frames = vec![at(0.0, "happy"), at(1.0, "sad"), at(3.0, "neutral")];
        let segments = timeline_segments(&frames, 4.0);

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].emotion, Some(Emotion::Happy));
        assert_eq!(segments[1].end, 3.0);
        assert_eq!(segments[2].end, 4.0);
        let widths: Vec<f64> = segments.iter().map(|s| s.width_percent).collect();
        assert_eq!(widths, vec![25.0, 50.0, 25.0]);
    }

    #[test]
    fn test_segments_without_duration() {
        let segments = timeline_segments(&[at(0.0, "happy")], 0.0);
        assert_eq!(segments[0].width_percent, 0.0);
        assert!(timeline_segments(&[], 10.0).is_empty());
    }

    #[test]
    fn test_unknown_label_has_no_emotion() {
        let segments = timeline_segments(&[at(0.0, "bored")], 1.0);
        assert_eq!(segments[0].emotion, None);
    }

    #[test]
    fn test_seek_time() {
        assert_eq!(seek_time(0.5, 30.0), 15.0);
        assert_eq!(seek_time(1.5, 30.0), 30.0);
        assert_eq!(seek_time(-0.2, 30.0), 0.0);
        assert_eq!(seek_time(0.5, 0.0), 0.0);
        assert_eq!(seek_time(f64::NAN, 30.0), 0.0);
    }
}
