use std::time::Duration;

use async_trait::async_trait;

use crate::models::WebhookPayload;

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// The deadline fired before the webhook answered.
    Timeout { after_ms: u128 },
    /// The webhook answered outside the 2xx range.
    Status { status: u16, body: String },
    /// Connection, TLS or body errors.
    Request(String),
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Timeout { after_ms } => {
                write!(f, "webhook timed out after {after_ms}ms")
            }
            DispatchError::Status { status, body } if body.is_empty() => {
                write!(f, "webhook returned HTTP {status}")
            }
            DispatchError::Status { status, body } => {
                write!(f, "webhook returned HTTP {status}: {body}")
            }
            DispatchError::Request(msg) => write!(f, "webhook request failed: {msg}"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Delivers one lead downstream. A single attempt per call.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, payload: &WebhookPayload) -> Result<(), DispatchError>;
}

pub struct HttpDispatcher {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpDispatcher {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            url: url.to_string(),
            timeout,
        })
    }

    async fn send(&self, payload: &WebhookPayload) -> Result<(), DispatchError> {
        let resp = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| DispatchError::Request(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(1024)
            .collect::<String>();

        Err(DispatchError::Status {
            status: status.as_u16(),
            body: body.trim().to_string(),
        })
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(&self, payload: &WebhookPayload) -> Result<(), DispatchError> {
        match tokio::time::timeout(self.timeout, self.send(payload)).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Timeout {
                after_ms: self.timeout.as_millis(),
            }),
        }
    }
}
