//! Event ingress: raw detections over a persistent TCP connection.
//!
//! The producer sends newline-delimited JSON records. Each record is
//! parsed and normalized into a [`RawDetection`]; a malformed record is
//! skipped with a warning and never terminates ingestion. Detections
//! are handed to the pipeline through a bounded channel that drops the
//! newest detection when full, so a stalled consumer cannot back up
//! into the producer.

mod server;

pub use server::IngressServer;

use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use wavehome_events::{Gesture, Hand, RawDetection};

/// Default channel capacity in detections. At a 30fps producer this is
/// roughly two seconds of backlog.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Errors that stop the ingress server itself.
#[derive(Debug, Error)]
pub enum IngressError {
    #[error("failed to bind ingress listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single record was skipped.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Unparseable JSON, or an unknown gesture or hand name.
    #[error("invalid record: {0}")]
    Invalid(String),

    /// Confidence outside `[0.0, 1.0]`.
    #[error("confidence {0} out of range")]
    ConfidenceOutOfRange(f32),
}

/// One record as the producer writes it on the wire.
#[derive(Debug, Deserialize)]
struct WireDetection {
    gesture: Gesture,
    hand: Hand,
    confidence: f32,
    /// Producer wall-clock milliseconds; optional.
    #[serde(default)]
    timestamp: i64,
}

/// Parse one wire line into a normalized detection.
///
/// `observed_at` is stamped at receipt: debounce arithmetic uses our
/// monotonic clock, not the producer's wall clock.
pub fn parse_line(line: &str) -> Result<RawDetection, RecordError> {
    let wire: WireDetection =
        serde_json::from_str(line).map_err(|e| RecordError::Invalid(e.to_string()))?;

    if !(0.0..=1.0).contains(&wire.confidence) {
        return Err(RecordError::ConfidenceOutOfRange(wire.confidence));
    }

    let ts_ms = if wire.timestamp > 0 {
        wire.timestamp
    } else {
        chrono::Utc::now().timestamp_millis()
    };

    Ok(RawDetection {
        gesture: wire.gesture,
        hand: wire.hand,
        confidence: wire.confidence,
        observed_at: Instant::now(),
        ts_ms,
    })
}

/// Sender half of the detection channel.
#[derive(Clone)]
pub struct DetectionSender {
    tx: mpsc::Sender<RawDetection>,
    dropped: Arc<AtomicU64>,
}

impl DetectionSender {
    /// Hand a detection to the pipeline, dropping it if the channel is
    /// full. Returns false on drop or when the pipeline has shut down.
    pub fn send(&self, detection: RawDetection) -> bool {
        match self.tx.try_send(detection) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                // Rate-limit logging to avoid spam under sustained backlog.
                if dropped % 10 == 1 {
                    tracing::warn!(dropped, "detection channel full, dropping");
                }
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("detection channel closed");
                false
            }
        }
    }

    /// Total detections dropped because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Bounded channel between ingress and the pipeline.
pub struct DetectionBus {
    sender: DetectionSender,
    receiver: Option<mpsc::Receiver<RawDetection>>,
}

impl DetectionBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            sender: DetectionSender {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            receiver: Some(rx),
        }
    }

    pub fn sender(&self) -> DetectionSender {
        self.sender.clone()
    }

    /// Take the receiver (can only be called once).
    pub fn take_receiver(&mut self) -> Option<mpsc::Receiver<RawDetection>> {
        self.receiver.take()
    }
}

impl Default for DetectionBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_record() {
        let det = parse_line(
            r#"{"gesture": "Open_Palm", "hand": "Right", "confidence": 0.92, "timestamp": 1700000000000}"#,
        )
        .unwrap();
        assert_eq!(det.gesture, Gesture::OpenPalm);
        assert_eq!(det.hand, Hand::Right);
        assert_eq!(det.ts_ms, 1700000000000);
    }

    #[test]
    fn missing_timestamp_is_stamped_at_receipt() {
        let det =
            parse_line(r#"{"gesture": "Victory", "hand": "Left", "confidence": 0.8}"#).unwrap();
        assert!(det.ts_ms > 0);
    }

    #[test]
    fn unknown_gesture_is_invalid() {
        let err = parse_line(r#"{"gesture": "Jazz_Hands", "hand": "Left", "confidence": 0.9}"#)
            .unwrap_err();
        assert!(matches!(err, RecordError::Invalid(_)));
    }

    #[test]
    fn unknown_hand_is_invalid() {
        let err = parse_line(r#"{"gesture": "Victory", "hand": "Unknown", "confidence": 0.9}"#)
            .unwrap_err();
        assert!(matches!(err, RecordError::Invalid(_)));
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(parse_line("not json at all").is_err());
        assert!(parse_line("").is_err());
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let err = parse_line(r#"{"gesture": "Victory", "hand": "Left", "confidence": 1.5}"#)
            .unwrap_err();
        assert!(matches!(err, RecordError::ConfidenceOutOfRange(_)));
    }

    #[tokio::test]
    async fn full_channel_drops_newest_and_counts() {
        let mut bus = DetectionBus::with_capacity(2);
        let sender = bus.sender();
        let _rx = bus.take_receiver().unwrap();

        let det = parse_line(r#"{"gesture": "Victory", "hand": "Left", "confidence": 0.9}"#)
            .unwrap();
        assert!(sender.send(det.clone()));
        assert!(sender.send(det.clone()));
        assert!(!sender.send(det.clone()));
        assert_eq!(sender.dropped(), 1);
    }
}
