//! Per-key rolling confirmation state.

use std::fmt;
use std::time::{Duration, Instant};
use wavehome_events::{Gesture, Hand};

/// Identity of a track: one gesture on one concrete hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackKey {
    pub gesture: Gesture,
    pub hand: Hand,
}

impl TrackKey {
    pub fn new(gesture: Gesture, hand: Hand) -> Self {
        Self { gesture, hand }
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.gesture, self.hand)
    }
}

/// Rolling confirmation state for one (gesture, hand) key.
///
/// Owned exclusively by the engine; a run is the span between
/// `first_seen_at` and `last_seen_at`, and `confirmed_at` drives the
/// cooldown regardless of run boundaries.
#[derive(Debug, Clone, Default)]
pub struct GestureTrack {
    /// Start of the current above-threshold run, unset while idle.
    pub first_seen_at: Option<Instant>,
    /// Most recent qualifying detection in the current run.
    pub last_seen_at: Option<Instant>,
    /// Time of the last confirmation, unset until the first one.
    pub confirmed_at: Option<Instant>,
    /// The current run has already confirmed.
    pub run_confirmed: bool,
}

impl GestureTrack {
    /// A track is in cooldown iff the last confirmation is more recent
    /// than the cooldown window.
    pub fn in_cooldown(&self, now: Instant, cooldown: Duration) -> bool {
        match self.confirmed_at {
            Some(at) => now.duration_since(at) < cooldown,
            None => false,
        }
    }

    /// Time left before this key may confirm again. Zero when not in
    /// cooldown.
    pub fn remaining_cooldown(&self, now: Instant, cooldown: Duration) -> Duration {
        match self.confirmed_at {
            Some(at) => cooldown.saturating_sub(now.duration_since(at)),
            None => Duration::ZERO,
        }
    }

    /// Clear the current run, keeping the cooldown clock.
    pub fn clear_run(&mut self) {
        self.first_seen_at = None;
        self.last_seen_at = None;
        self.run_confirmed = false;
    }

    /// Structural invariants: run endpoints are set together, and a
    /// confirmed run implies a confirmation timestamp.
    pub fn is_consistent(&self) -> bool {
        if self.first_seen_at.is_some() != self.last_seen_at.is_some() {
            return false;
        }
        if self.run_confirmed && self.confirmed_at.is_none() {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_track_is_idle_and_consistent() {
        let track = GestureTrack::default();
        assert!(track.is_consistent());
        assert!(!track.in_cooldown(Instant::now(), Duration::from_secs(2)));
        assert_eq!(
            track.remaining_cooldown(Instant::now(), Duration::from_secs(2)),
            Duration::ZERO
        );
    }

    #[test]
    fn cooldown_window_is_respected() {
        let confirmed = Instant::now();
        let track = GestureTrack {
            confirmed_at: Some(confirmed),
            ..Default::default()
        };
        let cooldown = Duration::from_secs(2);

        assert!(track.in_cooldown(confirmed + Duration::from_secs(1), cooldown));
        assert!(!track.in_cooldown(confirmed + Duration::from_secs(2), cooldown));
        assert_eq!(
            track.remaining_cooldown(confirmed + Duration::from_millis(1500), cooldown),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn half_open_run_is_inconsistent() {
        let track = GestureTrack {
            first_seen_at: Some(Instant::now()),
            ..Default::default()
        };
        assert!(!track.is_consistent());
    }

    #[test]
    fn clear_run_keeps_cooldown_clock() {
        let now = Instant::now();
        let mut track = GestureTrack {
            first_seen_at: Some(now),
            last_seen_at: Some(now),
            confirmed_at: Some(now),
            run_confirmed: true,
        };
        track.clear_run();
        assert!(track.first_seen_at.is_none());
        assert!(!track.run_confirmed);
        assert!(track.in_cooldown(now, Duration::from_secs(2)));
    }
}
