//! Hot reload of the mapping table and pipeline knobs.
//!
//! The loaded configuration is published as an immutable
//! [`ConfigSnapshot`] through a watch channel. Readers clone the
//! current snapshot and never block on a reload; a reload is a single
//! channel send of a fully-built replacement. A failed reload keeps
//! the previous snapshot active.

use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::table::MappingTable;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wavehome_engine::DebounceConfig;

/// How often the watcher polls the config file for changes.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(2);

/// Immutable view of the loaded configuration.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub table: Arc<MappingTable>,
    pub debounce: DebounceConfig,
    pub dispatch_timeout: Duration,
}

impl ConfigSnapshot {
    fn from_config(config: &AppConfig) -> Self {
        Self {
            table: Arc::new(MappingTable::new(config.mappings.clone())),
            debounce: config.pipeline.debounce(),
            dispatch_timeout: config.pipeline.dispatch_timeout(),
        }
    }
}

/// Owner of the config file path and the snapshot channel.
#[derive(Debug)]
pub struct ConfigHandle {
    path: PathBuf,
    tx: watch::Sender<ConfigSnapshot>,
}

impl ConfigHandle {
    /// Load the config file and build the initial snapshot.
    ///
    /// The initial load must succeed; returns the full [`AppConfig`]
    /// as well, for wiring the parts that do not hot-reload (endpoint,
    /// listen address).
    pub fn load(path: &Path) -> Result<(Self, AppConfig), ConfigError> {
        let config = AppConfig::load(path)?;
        let snapshot = ConfigSnapshot::from_config(&config);
        info!(
            path = %path.display(),
            mappings = snapshot.table.len(),
            "configuration loaded"
        );
        let (tx, _) = watch::channel(snapshot);
        Ok((
            Self {
                path: path.to_path_buf(),
                tx,
            },
            config,
        ))
    }

    /// Subscribe to snapshot updates. The receiver always starts with
    /// the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ConfigSnapshot> {
        self.tx.subscribe()
    }

    /// Current snapshot.
    pub fn current(&self) -> ConfigSnapshot {
        self.tx.borrow().clone()
    }

    /// Re-read the config file and swap in a new snapshot.
    ///
    /// On any failure the previous snapshot stays active and the error
    /// is returned for reporting.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let config = AppConfig::load(&self.path)?;
        let snapshot = ConfigSnapshot::from_config(&config);
        info!(
            mappings = snapshot.table.len(),
            "configuration reloaded"
        );
        self.tx.send_replace(snapshot);
        Ok(())
    }
}

/// Poll the config file's mtime and reload on change.
///
/// The mechanism is deliberately simple: a changed mtime triggers one
/// reload attempt, and a failed attempt is retried on the next change.
pub fn spawn_reload_watcher(
    handle: Arc<ConfigHandle>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_mtime = file_mtime(&handle.path);
        debug!(path = %handle.path.display(), ?interval, "config watcher started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let mtime = file_mtime(&handle.path);
            if mtime == last_mtime {
                continue;
            }
            last_mtime = mtime;

            if let Err(e) = handle.reload() {
                warn!(error = %e, "config reload failed, keeping previous configuration");
            }
        }

        debug!("config watcher stopped");
    })
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
