//! Pipeline orchestration.
//!
//! One task owns the debounce engine and processes detections in
//! arrival order (single-writer discipline). Confirmed occurrences are
//! resolved against the current mapping snapshot and handed to
//! independent dispatch tasks, so a slow or hung actuation call never
//! blocks ingestion. Shutdown stops accepting detections, lets
//! in-flight dispatches finish under a bounded grace period, and
//! flushes their outcomes to the feed.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wavehome_dispatch::Dispatcher;
use wavehome_engine::DebounceEngine;
use wavehome_events::{
    ActionOutcome, EventFeed, PipelineEvent, PipelineStats, RawDetection,
};
use wavehome_mappings::ConfigSnapshot;

/// Default time allowed for in-flight dispatches to finish on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// What the run loop should do next. Produced by the select arms so
/// the handlers run with no channel futures alive.
enum Step {
    ConfigChanged,
    ConfigClosed,
    DispatchDone(Result<ActionOutcome, JoinError>),
    Detection(RawDetection),
    Stop,
}

/// The detection-to-outcome processing loop.
pub struct Pipeline {
    dispatcher: Dispatcher,
    feed: EventFeed,
    stats: Arc<PipelineStats>,
    config_rx: watch::Receiver<ConfigSnapshot>,
    shutdown_grace: Duration,
}

impl Pipeline {
    pub fn new(
        dispatcher: Dispatcher,
        feed: EventFeed,
        stats: Arc<PipelineStats>,
        config_rx: watch::Receiver<ConfigSnapshot>,
    ) -> Self {
        Self {
            dispatcher,
            feed,
            stats,
            config_rx,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Override the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Run until cancelled or the detection channel closes.
    pub async fn run(self, mut detections: mpsc::Receiver<RawDetection>, cancel: CancellationToken) {
        let mut config_rx = self.config_rx.clone();
        let mut engine = DebounceEngine::new(config_rx.borrow().debounce);
        let mut dispatches: JoinSet<ActionOutcome> = JoinSet::new();

        info!("pipeline started");

        let mut config_open = true;
        loop {
            let step = tokio::select! {
                _ = cancel.cancelled() => Step::Stop,

                changed = config_rx.changed(), if config_open => match changed {
                    Ok(()) => Step::ConfigChanged,
                    Err(_) => Step::ConfigClosed,
                },

                Some(joined) = dispatches.join_next(), if !dispatches.is_empty() => {
                    Step::DispatchDone(joined)
                }

                maybe = detections.recv() => match maybe {
                    Some(detection) => Step::Detection(detection),
                    None => Step::Stop,
                }
            };

            match step {
                Step::ConfigChanged => {
                    engine.set_config(config_rx.borrow_and_update().debounce);
                }
                Step::ConfigClosed => {
                    // Config handle dropped; keep running on the last
                    // snapshot.
                    config_open = false;
                }
                Step::DispatchDone(joined) => self.finish_dispatch(joined),
                Step::Detection(detection) => {
                    self.handle_detection(&mut engine, &mut dispatches, &config_rx, detection);
                }
                Step::Stop => break,
            }
        }

        self.drain(dispatches).await;
        info!(stats = ?engine.stats(), "pipeline stopped");
    }

    /// Ingest one detection and, on confirmation, start a dispatch.
    ///
    /// Engine mutation happens entirely here, never across an await.
    fn handle_detection(
        &self,
        engine: &mut DebounceEngine,
        dispatches: &mut JoinSet<ActionOutcome>,
        config_rx: &watch::Receiver<ConfigSnapshot>,
        detection: RawDetection,
    ) {
        let before = engine.stats();
        let Some(occurrence) = engine.ingest(&detection) else {
            let after = engine.stats();
            if after.below_floor > before.below_floor {
                self.stats.record_below_floor();
            } else {
                self.stats.record_debounced();
            }
            return;
        };

        self.stats.record_confirmed();
        self.feed
            .publish(PipelineEvent::Occurrence(occurrence.clone()));

        let snapshot = config_rx.borrow().clone();
        match snapshot.table.resolve(&occurrence) {
            Some(mapping) => {
                self.stats.record_dispatched();
                let dispatcher = self.dispatcher.clone();
                let mapping = mapping.clone();
                let timeout = snapshot.dispatch_timeout;
                dispatches.spawn(async move { dispatcher.dispatch(&mapping, timeout).await });
            }
            None => {
                // Normal filtered-out path, but worth a signal.
                self.stats.record_unmatched();
                debug!(
                    gesture = %occurrence.gesture,
                    hand = %occurrence.hand,
                    "no mapping matched confirmed gesture"
                );
            }
        }
    }

    fn finish_dispatch(&self, joined: Result<ActionOutcome, JoinError>) {
        match joined {
            Ok(outcome) => {
                if outcome.success {
                    self.stats.record_succeeded();
                } else {
                    self.stats.record_failed();
                }
                self.feed.publish(PipelineEvent::Outcome(outcome));
            }
            Err(e) => {
                warn!(error = %e, "dispatch task panicked");
                self.stats.record_failed();
            }
        }
    }

    /// Let in-flight dispatches complete within the grace period, then
    /// abort whatever is left.
    async fn drain(&self, mut dispatches: JoinSet<ActionOutcome>) {
        if dispatches.is_empty() {
            return;
        }
        info!(in_flight = dispatches.len(), "draining in-flight dispatches");

        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while let Some(joined) = dispatches.join_next().await {
                self.finish_dispatch(joined);
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = dispatches.len(),
                "shutdown grace expired, aborting remaining dispatches"
            );
            dispatches.abort_all();
        }
    }
}
