//! Action dispatch against the external actuation service.
//!
//! Every dispatch attempt yields exactly one [`ActionOutcome`]: service
//! errors, unknown targets, unauthorized calls, and timeouts all become
//! `success=false` with a human-readable reason. Nothing propagates
//! past this boundary, and nothing is retried — a failed action is
//! reported once and the user repeats the gesture.

mod client;

pub use client::HomeAssistantClient;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};
use wavehome_events::ActionOutcome;
use wavehome_mappings::GestureMapping;

/// Failure causes surfaced by the actuation service.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The target entity does not exist.
    #[error("unknown target")]
    UnknownTarget,

    /// The service rejected our credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// The service answered with an unexpected status.
    #[error("service error: HTTP {status}")]
    Service { status: u16 },

    /// The service could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// Credentials could not be loaded.
    #[error("credentials: {0}")]
    Credentials(String),
}

/// Capability to invoke an operation on a target device.
///
/// Implemented by [`HomeAssistantClient`] in production and by
/// in-memory fakes in tests.
#[async_trait]
pub trait ActuationService: Send + Sync {
    async fn invoke(
        &self,
        target_id: &str,
        operation: &str,
        parameters: &serde_json::Value,
    ) -> Result<(), DispatchError>;
}

/// Executes mapped actions and reports outcomes.
#[derive(Clone)]
pub struct Dispatcher {
    service: Arc<dyn ActuationService>,
}

impl Dispatcher {
    pub fn new(service: Arc<dyn ActuationService>) -> Self {
        Self { service }
    }

    /// Invoke the mapping's action under a bounded timeout.
    ///
    /// Infallible by design: expiry and every service failure become a
    /// failed outcome.
    pub async fn dispatch(&self, mapping: &GestureMapping, timeout: Duration) -> ActionOutcome {
        let action = &mapping.action;
        let start = Instant::now();

        let result = tokio::time::timeout(
            timeout,
            self.service
                .invoke(&action.target_id, &action.operation, &action.parameters),
        )
        .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(())) => {
                info!(
                    mapping = %mapping.name,
                    target = %action.target_id,
                    operation = %action.operation,
                    duration_ms,
                    "action dispatched"
                );
                ActionOutcome::success(&mapping.name, &action.target_id, &action.operation, duration_ms)
            }
            Ok(Err(e)) => {
                warn!(
                    mapping = %mapping.name,
                    target = %action.target_id,
                    error = %e,
                    "action failed"
                );
                ActionOutcome::failure(
                    &mapping.name,
                    &action.target_id,
                    &action.operation,
                    e.to_string(),
                    duration_ms,
                )
            }
            Err(_) => {
                warn!(
                    mapping = %mapping.name,
                    target = %action.target_id,
                    timeout_s = timeout.as_secs_f32(),
                    "action timed out"
                );
                ActionOutcome::failure(
                    &mapping.name,
                    &action.target_id,
                    &action.operation,
                    format!("timed out after {:.1}s", timeout.as_secs_f32()),
                    duration_ms,
                )
            }
        }
    }
}
