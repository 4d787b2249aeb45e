//! YAML configuration file loading and validation.

use crate::error::ConfigError;
use crate::table::GestureMapping;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use wavehome_engine::{DebounceConfig, DipPolicy, HoldPolicy};

/// Top-level configuration file contents.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub home_assistant: HomeAssistantConfig,
    #[serde(default)]
    pub ingress: IngressConfig,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub mappings: Vec<GestureMapping>,
}

/// Actuation service endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HomeAssistantConfig {
    /// Base URL, e.g. `http://localhost:8123`.
    pub base_url: String,
    /// Environment variable holding the long-lived access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_token_env() -> String {
    "HA_TOKEN".to_string()
}

/// Detection ingress settings.
#[derive(Debug, Clone, Deserialize)]
pub struct IngressConfig {
    /// Listen address for the producer connection.
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "127.0.0.1:5555".to_string()
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Pipeline timing and threshold knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub confidence_floor: f32,
    pub hold_time_seconds: f64,
    pub cooldown_seconds: f64,
    pub gap_reset_seconds: f64,
    pub dispatch_timeout_seconds: f64,
    pub dip_policy: DipPolicy,
    pub hold_policy: HoldPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            confidence_floor: 0.8,
            hold_time_seconds: 0.5,
            cooldown_seconds: 2.0,
            gap_reset_seconds: 0.5,
            dispatch_timeout_seconds: 10.0,
            dip_policy: DipPolicy::default(),
            hold_policy: HoldPolicy::default(),
        }
    }
}

impl PipelineSettings {
    /// Engine knobs derived from these settings.
    pub fn debounce(&self) -> DebounceConfig {
        DebounceConfig {
            confidence_floor: self.confidence_floor,
            hold_time: Duration::from_secs_f64(self.hold_time_seconds),
            cooldown: Duration::from_secs_f64(self.cooldown_seconds),
            gap_reset: Duration::from_secs_f64(self.gap_reset_seconds),
            dip_policy: self.dip_policy,
            hold_policy: self.hold_policy,
        }
    }

    /// Upper bound on a single actuation call.
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.dispatch_timeout_seconds)
    }
}

impl AppConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: AppConfig =
            serde_yml::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Structural validation beyond what deserialization enforces.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let settings = &self.pipeline;
        if !(0.0..=1.0).contains(&settings.confidence_floor) {
            return Err(ConfigError::InvalidSetting {
                message: format!(
                    "confidence_floor must be within 0.0..=1.0, got {}",
                    settings.confidence_floor
                ),
            });
        }
        for (name, value) in [
            ("hold_time_seconds", settings.hold_time_seconds),
            ("cooldown_seconds", settings.cooldown_seconds),
            ("gap_reset_seconds", settings.gap_reset_seconds),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidSetting {
                    message: format!("{name} must be a non-negative number, got {value}"),
                });
            }
        }
        if !settings.dispatch_timeout_seconds.is_finite()
            || settings.dispatch_timeout_seconds <= 0.0
        {
            return Err(ConfigError::InvalidSetting {
                message: format!(
                    "dispatch_timeout_seconds must be positive, got {}",
                    settings.dispatch_timeout_seconds
                ),
            });
        }

        for (index, mapping) in self.mappings.iter().enumerate() {
            let invalid = |message: String| ConfigError::InvalidMapping {
                index,
                name: mapping.name.clone(),
                message,
            };

            if mapping.name.trim().is_empty() {
                return Err(invalid("name must not be empty".to_string()));
            }
            if !(0.0..=1.0).contains(&mapping.confidence_threshold) {
                return Err(invalid(format!(
                    "confidence_threshold must be within 0.0..=1.0, got {}",
                    mapping.confidence_threshold
                )));
            }
            if mapping.action.operation.trim().is_empty() {
                return Err(invalid("action.operation must not be empty".to_string()));
            }
            // Target IDs are `domain.entity`; the domain routes the
            // service call.
            let target = &mapping.action.target_id;
            if !target.split_once('.').is_some_and(|(d, e)| !d.is_empty() && !e.is_empty()) {
                return Err(invalid(format!(
                    "action.target_id must look like 'domain.entity', got '{target}'"
                )));
            }
        }

        Ok(())
    }
}
