//! Remote agent launch port
//!
//! A launch only starts the worker. Task completion arrives later through the
//! worker's own journal events; nothing here waits for the work itself.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Acknowledgement that the remote agent runtime accepted a launch request
#[derive(Debug, Clone, Default)]
pub struct LaunchAck {
    /// Opaque launch reference returned by the agent runtime, when it has one
    pub reference: Option<String>,
}

/// Errors from the launch call
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("launch transport error: {0}")]
    Transport(String),

    #[error("launch rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Port for starting one remote agent run for a correlation id
#[async_trait]
pub trait AgentLauncher: Send + Sync {
    async fn launch(&self, correlation_id: &str) -> Result<LaunchAck, LaunchError>;
}

pub type SharedAgentLauncher = Arc<dyn AgentLauncher>;

/// Launches agents by POSTing the correlation id to a configured endpoint
pub struct HttpAgentLauncher {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpAgentLauncher {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout: DEFAULT_LAUNCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl AgentLauncher for HttpAgentLauncher {
    async fn launch(&self, correlation_id: &str) -> Result<LaunchAck, LaunchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&serde_json::json!({ "correlationId": correlation_id }))
            .send()
            .await
            .map_err(|e| LaunchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LaunchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response.json().await.unwrap_or_default();
        Ok(LaunchAck {
            reference: body
                .get("reference")
                .and_then(|value| value.as_str())
                .map(ToString::to_string),
        })
    }
}
