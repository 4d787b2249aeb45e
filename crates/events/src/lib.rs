//! Shared event contracts for the gesture pipeline.
//!
//! This crate defines the records that flow between pipeline stages:
//! raw detections in, confirmed occurrences and action outcomes out.
//! Using shared types prevents runtime deserialization errors from
//! mismatched field names between producer and consumer.
//!
//! Also provides the [`EventFeed`] broadcast for observer fan-out and
//! lock-free [`PipelineStats`] counters.

mod feed;
mod stats;

pub use feed::{EventFeed, PipelineEvent, DEFAULT_FEED_CAPACITY};
pub use stats::{PipelineStats, PipelineStatsSnapshot};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Recognizable hand poses. Closed set matching the producer model's
/// category names on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gesture {
    #[serde(rename = "Closed_Fist")]
    ClosedFist,
    #[serde(rename = "Open_Palm")]
    OpenPalm,
    #[serde(rename = "Pointing_Up")]
    PointingUp,
    #[serde(rename = "Thumb_Down")]
    ThumbDown,
    #[serde(rename = "Thumb_Up")]
    ThumbUp,
    #[serde(rename = "Victory")]
    Victory,
    #[serde(rename = "ILoveYou")]
    ILoveYou,
}

impl Gesture {
    /// Wire name as produced by the recognizer.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Gesture::ClosedFist => "Closed_Fist",
            Gesture::OpenPalm => "Open_Palm",
            Gesture::PointingUp => "Pointing_Up",
            Gesture::ThumbDown => "Thumb_Down",
            Gesture::ThumbUp => "Thumb_Up",
            Gesture::Victory => "Victory",
            Gesture::ILoveYou => "ILoveYou",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Which hand a detection was observed on.
///
/// A detection is always one concrete hand; `Either` exists only on the
/// mapping side as a wildcard selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hand {
    Left,
    Right,
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hand::Left => f.write_str("Left"),
            Hand::Right => f.write_str("Right"),
        }
    }
}

/// One normalized inference result from the upstream producer.
///
/// Created by ingress for every frame with a detected hand, consumed
/// once by the debounce engine, then discarded.
#[derive(Debug, Clone)]
pub struct RawDetection {
    pub gesture: Gesture,
    pub hand: Hand,
    /// Model confidence in `[0.0, 1.0]`.
    pub confidence: f32,
    /// Monotonic receipt time, used for all debounce arithmetic.
    pub observed_at: Instant,
    /// Producer wall-clock timestamp in milliseconds, display only.
    pub ts_ms: i64,
}

impl RawDetection {
    /// Build a detection observed now.
    pub fn new(gesture: Gesture, hand: Hand, confidence: f32) -> Self {
        Self {
            gesture,
            hand,
            confidence,
            observed_at: Instant::now(),
            ts_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// A confirmed, de-duplicated gesture event eligible for dispatch.
///
/// Emitted exactly once per confirmation by the debounce engine.
#[derive(Debug, Clone, Serialize)]
pub struct GestureOccurrence {
    pub gesture: Gesture,
    pub hand: Hand,
    /// Confidence of the detection that crossed the hold threshold.
    pub confidence: f32,
    /// Monotonic confirmation time.
    #[serde(skip_serializing)]
    pub confirmed_at: Instant,
    /// Wall-clock confirmation time in milliseconds.
    pub ts_ms: i64,
}

/// Result of one dispatch attempt against the actuation service.
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    /// Display name of the mapping that matched.
    pub mapping_name: String,
    pub target_id: String,
    pub operation: String,
    pub success: bool,
    /// Human-readable failure reason, present iff `!success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock completion time in milliseconds.
    pub completed_at_ms: i64,
    /// Round-trip duration of the invoke call.
    pub duration_ms: u64,
}

impl ActionOutcome {
    /// Build a successful outcome completed now.
    pub fn success(
        mapping_name: impl Into<String>,
        target_id: impl Into<String>,
        operation: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            mapping_name: mapping_name.into(),
            target_id: target_id.into(),
            operation: operation.into(),
            success: true,
            error: None,
            completed_at_ms: chrono::Utc::now().timestamp_millis(),
            duration_ms,
        }
    }

    /// Build a failed outcome completed now.
    pub fn failure(
        mapping_name: impl Into<String>,
        target_id: impl Into<String>,
        operation: impl Into<String>,
        error: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            mapping_name: mapping_name.into(),
            target_id: target_id.into(),
            operation: operation.into(),
            success: false,
            error: Some(error.into()),
            completed_at_ms: chrono::Utc::now().timestamp_millis(),
            duration_ms,
        }
    }
}
