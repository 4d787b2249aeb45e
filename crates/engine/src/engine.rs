//! The per-key confirmation state machine.

use crate::track::{GestureTrack, TrackKey};
use crate::{DebounceConfig, DipPolicy, HoldPolicy};
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use wavehome_events::{GestureOccurrence, RawDetection};

/// Counters maintained by the engine across ingests.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EngineStats {
    /// Detections offered to the engine.
    pub received: u64,
    /// Detections rejected below the confidence floor.
    pub below_floor: u64,
    /// Qualifying detections absorbed without a confirmation.
    pub debounced: u64,
    /// Occurrences emitted.
    pub confirmed: u64,
}

/// Converts noisy per-frame detections into rate-limited occurrences.
///
/// Single-writer: the engine is owned by one task and processes one
/// detection at a time. Tracks for different keys never interact.
pub struct DebounceEngine {
    config: DebounceConfig,
    tracks: HashMap<TrackKey, GestureTrack>,
    stats: EngineStats,
}

impl DebounceEngine {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            tracks: HashMap::new(),
            stats: EngineStats::default(),
        }
    }

    /// Feed one detection through the state machine.
    ///
    /// Returns a confirmed occurrence when the run length reaches the
    /// hold time and the key is not in cooldown. Under
    /// [`HoldPolicy::Single`] a run confirms at most once; under the
    /// default [`HoldPolicy::Refire`] a held gesture confirms again
    /// each time the cooldown expires. All other detections return
    /// `None`.
    pub fn ingest(&mut self, detection: &RawDetection) -> Option<GestureOccurrence> {
        self.stats.received += 1;
        let key = TrackKey::new(detection.gesture, detection.hand);

        if detection.confidence < self.config.confidence_floor {
            self.stats.below_floor += 1;
            if self.config.dip_policy == DipPolicy::ResetRun {
                if let Some(track) = self.tracks.get_mut(&key) {
                    track.clear_run();
                }
            }
            return None;
        }

        let now = detection.observed_at;
        let track = self.tracks.entry(key).or_default();

        if !track.is_consistent() {
            // Invariant violation is fatal only for this track.
            warn!(%key, ?track, "resetting track with inconsistent state");
            *track = GestureTrack::default();
        }

        // The gap check runs even during cooldown: a release and
        // re-hold inside the cooldown window still starts a new run.
        let gap_elapsed = match track.last_seen_at {
            Some(last) => now.duration_since(last) > self.config.gap_reset,
            None => true,
        };
        if gap_elapsed {
            track.first_seen_at = Some(now);
            track.run_confirmed = false;
        }
        track.last_seen_at = Some(now);

        if track.in_cooldown(now, self.config.cooldown) {
            self.stats.debounced += 1;
            return None;
        }

        let first = *track.first_seen_at.get_or_insert(now);
        let held = now.duration_since(first) >= self.config.hold_time;
        let confirmable = match self.config.hold_policy {
            HoldPolicy::Refire => held,
            HoldPolicy::Single => held && !track.run_confirmed,
        };

        if confirmable {
            track.run_confirmed = true;
            track.confirmed_at = Some(now);
            self.stats.confirmed += 1;
            debug!(%key, confidence = detection.confidence, "gesture confirmed");
            return Some(GestureOccurrence {
                gesture: detection.gesture,
                hand: detection.hand,
                confidence: detection.confidence,
                confirmed_at: now,
                ts_ms: detection.ts_ms,
            });
        }

        self.stats.debounced += 1;
        None
    }

    /// Current engine configuration.
    pub fn config(&self) -> &DebounceConfig {
        &self.config
    }

    /// Apply new knobs. Takes effect from the next detection; existing
    /// runs and cooldowns are measured against the new values.
    pub fn set_config(&mut self, config: DebounceConfig) {
        if config != self.config {
            debug!(?config, "debounce config updated");
        }
        self.config = config;
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Number of keys with any recorded state.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Time left before `key` may confirm again.
    pub fn remaining_cooldown(&self, key: &TrackKey, now: Instant) -> Duration {
        self.tracks
            .get(key)
            .map(|t| t.remaining_cooldown(now, self.config.cooldown))
            .unwrap_or(Duration::ZERO)
    }

    /// All keys currently in cooldown with their remaining time.
    pub fn active_cooldowns(&self, now: Instant) -> Vec<(TrackKey, Duration)> {
        self.tracks
            .iter()
            .filter_map(|(key, track)| {
                let remaining = track.remaining_cooldown(now, self.config.cooldown);
                (remaining > Duration::ZERO).then_some((*key, remaining))
            })
            .collect()
    }

    /// Drop all state for one key.
    pub fn reset_key(&mut self, key: &TrackKey) {
        if self.tracks.remove(key).is_some() {
            debug!(%key, "track reset");
        }
    }

    /// Drop all tracks. Counters are preserved.
    pub fn reset(&mut self) {
        self.tracks.clear();
        debug!("all tracks reset");
    }
}
