//! Emotion KPIs over a video's frames.

use crate::models::{Emotion, Frame};
use serde::Serialize;

/// Label of a frame.
///
/// The single-label `emotion` wins when it is a known class; otherwise the
/// class with the highest entry in `confidences` is used.
pub fn frame_label(frame: &Frame) -> Option<Emotion> {
    if let Some(emotion) = frame.emotion.as_deref().and_then(Emotion::parse) {
        return Some(emotion);
    }

    frame
        .emotions
        .iter()
        .zip(frame.confidences.iter())
        .fold(None::<(&String, f64)>, |best, (label, conf)| match best {
            Some((_, best_conf)) if best_conf >= *conf => best,
            _ => Some((label, *conf)),
        })
        .and_then(|(label, _)| Emotion::parse(label))
}

/// Headline numbers for one analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmotionInsights {
    /// All frames received, valid or not.
    pub frame_count: usize,
    /// Frames with a known label and a numeric confidence.
    pub valid_frames: usize,
    pub predominant: Emotion,
    /// Mean confidence of valid frames, as a percentage.
    pub average_confidence: f64,
    /// Share of valid frames per emotion, in `Emotion::ALL` order.
    pub percentages: Vec<(Emotion, f64)>,
}

impl EmotionInsights {
    /// Compute insights, or `None` when no frame is usable.
    pub fn from_frames(frames: &[Frame]) -> Option<Self> {
        let mut counts = [0usize; Emotion::ALL.len()];
        let mut total_confidence = 0.0;
        let mut valid = 0usize;

        for frame in frames {
            let (Some(emotion), Some(confidence)) =
                (frame.emotion.as_deref().and_then(Emotion::parse), frame.confidence)
            else {
                continue;
            };
            if !confidence.is_finite() {
                continue;
            }
            counts[index_of(emotion)] += 1;
            total_confidence += confidence;
            valid += 1;
        }

        if valid == 0 {
            return None;
        }

        // Ties go to the emotion listed first.
        let mut predominant = Emotion::ALL[0];
        let mut best = counts[0];
        for (i, count) in counts.iter().enumerate().skip(1) {
            if *count > best {
                best = *count;
                predominant = Emotion::ALL[i];
            }
        }

        let percentages = Emotion::ALL
            .iter()
            .zip(counts.iter())
            .map(|(emotion, count)| (*emotion, *count as f64 / valid as f64 * 100.0))
            .collect();

        Some(Self {
            frame_count: frames.len(),
            valid_frames: valid,
            predominant,
            average_confidence: total_confidence / valid as f64 * 100.0,
            percentages,
        })
    }

    pub fn percentage(&self, emotion: Emotion) -> f64 {
        self.percentages
            .iter()
            .find(|(e, _)| *e == emotion)
            .map(|(_, pct)| *pct)
            .unwrap_or(0.0)
    }
}

fn index_of(emotion: Emotion) -> usize {
    Emotion::ALL
        .iter()
        .position(|e| *e == emotion)
        .unwrap_or(Emotion::ALL.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(emotion: &str, confidence: f64) -> Frame {
        Frame {
            emotion: Some(emotion.to_string()),
            confidence: Some(confidence),
            ..Frame::default()
        }
    }

    #[test]
    fn test_frame_label_prefers_single_label() {
        let frame = Frame {
            emotion: Some("sad".to_string()),
            emotions: vec!["happy".to_string()],
            confidences: vec![0.9],
            ..Frame::default()
        };
        assert_eq!(frame_label(&frame), Some(Emotion::Sad));
    }

    #[test]
    fn test_frame_label_from_confidences() {
        let frame = Frame {
            emotions: vec!["neutral".to_string(), "angry".to_string(), "fear".to_string()],
            confidences: vec![0.2, 0.5, 0.3],
            ..Frame::default()
        };
        assert_eq!(frame_label(&frame), Some(Emotion::Angry));
        assert_eq!(frame_label(&Frame::default()), None);
    }

    #[test]
    fn test_insights_counts() {
        let frames = vec![
            labelled("HAPPY", 0.9),
            labelled("HAPPY", 0.7),
            labelled("SAD", 0.8),
            labelled("happy", 0.6),
            Frame::default(),
            labelled("BORED", 0.9),
        ];

        let insights = EmotionInsights::from_frames(&frames).unwrap();
        assert_eq!(insights.frame_count, 6);
        assert_eq!(insights.valid_frames, 4);
        assert_eq!(insights.predominant, Emotion::Happy);
        assert!((insights.average_confidence - 75.0).abs() < 1e-9);
        assert!((insights.percentage(Emotion::Happy) - 75.0).abs() < 1e-9);
        assert!((insights.percentage(Emotion::Sad) - 25.0).abs() < 1e-9);
        assert_eq!(insights.percentage(Emotion::Fear), 0.0);
        assert_eq!(insights.percentages.len(), Emotion::ALL.len());
    }

    #[test]
    fn test_insights_tie_goes_to_first() {
        let frames = vec![labelled("FEAR", 0.5), labelled("SAD", 0.5)];
        let insights = EmotionInsights::from_frames(&frames).unwrap();
        assert_eq!(insights.predominant, Emotion::Sad);
    }

    #[test]
    fn test_insights_need_valid_frames() {
        assert!(EmotionInsights::from_frames(&[]).is_none());
        let frames = vec![Frame {
            emotion: Some("HAPPY".to_string()),
            confidence: None,
            ..Frame::default()
        }];
        assert!(EmotionInsights::from_frames(&frames).is_none());
    }
}
