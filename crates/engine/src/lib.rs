//! Debounce and confirmation engine.
//!
//! Converts a stream of raw, possibly-flickering detections into
//! discrete confirmed gesture occurrences by applying a confidence
//! floor, a hold-time requirement, a gap-reset window, and a
//! post-confirmation cooldown, independently per (gesture, hand) key.

mod engine;
mod track;

pub use engine::{DebounceEngine, EngineStats};
pub use track::{GestureTrack, TrackKey};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a below-floor confidence dip does to an in-progress run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DipPolicy {
    /// The dip itself is ignored; the run only resets if the gap since
    /// the last qualifying detection exceeds the gap-reset window.
    #[default]
    GapTimeout,
    /// The dip clears the run immediately.
    ResetRun,
}

/// What a gesture held past the cooldown window does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldPolicy {
    /// A continuously held gesture confirms again each time the
    /// cooldown expires.
    #[default]
    Refire,
    /// One confirmation per run; re-confirming requires a release
    /// longer than the gap-reset window.
    Single,
}

/// Timing and threshold knobs for the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebounceConfig {
    /// Detections below this confidence never enter a track.
    pub confidence_floor: f32,
    /// Minimum continuous run length before a confirmation.
    pub hold_time: Duration,
    /// Minimum time between confirmations of the same key.
    pub cooldown: Duration,
    /// A silence longer than this between detections starts a new run.
    pub gap_reset: Duration,
    /// Behavior of a mid-run confidence dip.
    pub dip_policy: DipPolicy,
    /// Behavior of a gesture held past the cooldown.
    pub hold_policy: HoldPolicy,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.8,
            hold_time: Duration::from_millis(500),
            cooldown: Duration::from_secs(2),
            gap_reset: Duration::from_millis(500),
            dip_policy: DipPolicy::GapTimeout,
            hold_policy: HoldPolicy::Refire,
        }
    }
}
