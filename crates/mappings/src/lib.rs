//! Gesture-to-action mapping table and configuration.
//!
//! Mappings live in a YAML config file alongside the pipeline knobs.
//! Loaded configuration is published as an immutable snapshot through a
//! watch channel: a reload swaps in a whole new table, and in-flight
//! resolutions never observe a half-updated one.

mod config;
mod error;
mod table;
mod watcher;

pub use config::{AppConfig, HomeAssistantConfig, IngressConfig, PipelineSettings};
pub use error::ConfigError;
pub use table::{DeviceAction, GestureMapping, HandSelector, MappingTable};
pub use watcher::{spawn_reload_watcher, ConfigHandle, ConfigSnapshot, DEFAULT_WATCH_INTERVAL};
