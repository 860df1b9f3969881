//! Analysis statistics.
//!
//! Collection-level counters for the dashboard and per-video emotion
//! insights computed from frame data.

pub mod aggregator;
pub mod insights;
pub mod timeline;

pub use aggregator::*;
pub use insights::{frame_label, EmotionInsights};
pub use timeline::{seek_time, timeline_segments, TimelineSegment};
