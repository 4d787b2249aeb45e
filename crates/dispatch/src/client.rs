//! Home Assistant REST client.

use crate::{ActuationService, DispatchError};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Tokens shorter than this are almost certainly misconfigured;
/// long-lived Home Assistant tokens run ~180 characters.
const MIN_TOKEN_LENGTH: usize = 50;

/// Client for the Home Assistant service-call API.
pub struct HomeAssistantClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HomeAssistantClient {
    /// Build a client with the token read from `token_env`.
    ///
    /// The token value itself is never logged, only its length.
    pub fn from_env(base_url: &str, token_env: &str) -> Result<Self, DispatchError> {
        let token = std::env::var(token_env).map_err(|_| {
            DispatchError::Credentials(format!(
                "{token_env} is not set; configure your Home Assistant access token"
            ))
        })?;
        if token.is_empty() {
            return Err(DispatchError::Credentials(format!("{token_env} is empty")));
        }
        if token.len() < MIN_TOKEN_LENGTH {
            warn!(
                env = token_env,
                length = token.len(),
                "token looks too short for a long-lived access token"
            );
        }
        info!(env = token_env, length = token.len(), "access token loaded");

        Ok(Self::with_token(base_url, token))
    }

    /// Build a client with an explicit token.
    pub fn with_token(base_url: &str, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Health check against the API root.
    pub async fn ping(&self) -> Result<(), DispatchError> {
        let url = format!("{}/api/", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        map_status(response.status().as_u16())
    }
}

/// Split `domain.entity` into the service domain.
fn service_domain(target_id: &str) -> Result<&str, DispatchError> {
    match target_id.split_once('.') {
        Some((domain, entity)) if !domain.is_empty() && !entity.is_empty() => Ok(domain),
        _ => Err(DispatchError::UnknownTarget),
    }
}

/// Merge `entity_id` and the configured parameters into one payload.
fn build_payload(target_id: &str, parameters: &serde_json::Value) -> serde_json::Value {
    let mut payload = serde_json::json!({ "entity_id": target_id });
    if let Some(extra) = parameters.as_object() {
        for (key, value) in extra {
            payload[key] = value.clone();
        }
    }
    payload
}

fn map_status(status: u16) -> Result<(), DispatchError> {
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(DispatchError::Unauthorized),
        404 => Err(DispatchError::UnknownTarget),
        status => Err(DispatchError::Service { status }),
    }
}

#[async_trait]
impl ActuationService for HomeAssistantClient {
    async fn invoke(
        &self,
        target_id: &str,
        operation: &str,
        parameters: &serde_json::Value,
    ) -> Result<(), DispatchError> {
        let domain = service_domain(target_id)?;
        let url = format!("{}/api/services/{}/{}", self.base_url, domain, operation);
        let payload = build_payload(target_id, parameters);

        debug!(%url, %target_id, "calling service");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        map_status(response.status().as_u16())
    }
}
