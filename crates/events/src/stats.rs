//! Pipeline counters with atomic fields for lock-free updates.
//!
//! Shared via `Arc<PipelineStats>` and bumped from the ingest and
//! dispatch hot paths without locks.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals for the pipeline since start.
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Raw records received on ingress (including malformed ones).
    received: AtomicU64,
    /// Records skipped because they could not be parsed or normalized.
    malformed: AtomicU64,
    /// Detections dropped because the ingest channel was full.
    dropped: AtomicU64,
    /// Detections rejected below the global confidence floor.
    below_floor: AtomicU64,
    /// Detections absorbed by hold-time accumulation or cooldown.
    debounced: AtomicU64,
    /// Occurrences confirmed by the engine.
    confirmed: AtomicU64,
    /// Occurrences with no matching mapping.
    unmatched: AtomicU64,
    /// Dispatch attempts started.
    dispatched: AtomicU64,
    /// Dispatches that succeeded.
    succeeded: AtomicU64,
    /// Dispatches that failed.
    failed: AtomicU64,
}

macro_rules! counter {
    ($inc:ident, $get:ident, $field:ident) => {
        pub fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }

        pub fn $get(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(record_received, received, received);
    counter!(record_malformed, malformed, malformed);
    counter!(record_dropped, dropped, dropped);
    counter!(record_below_floor, below_floor, below_floor);
    counter!(record_debounced, debounced, debounced);
    counter!(record_confirmed, confirmed, confirmed);
    counter!(record_unmatched, unmatched, unmatched);
    counter!(record_dispatched, dispatched, dispatched);
    counter!(record_succeeded, succeeded, succeeded);
    counter!(record_failed, failed, failed);

    /// Snapshot for serialization or a final report.
    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            received: self.received(),
            malformed: self.malformed(),
            dropped: self.dropped(),
            below_floor: self.below_floor(),
            debounced: self.debounced(),
            confirmed: self.confirmed(),
            unmatched: self.unmatched(),
            dispatched: self.dispatched(),
            succeeded: self.succeeded(),
            failed: self.failed(),
        }
    }
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStatsSnapshot {
    pub received: u64,
    pub malformed: u64,
    pub dropped: u64,
    pub below_floor: u64,
    pub debounced: u64,
    pub confirmed: u64,
    pub unmatched: u64,
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
}
