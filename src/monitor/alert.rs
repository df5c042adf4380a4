// Alert delivery to a JSON webhook sink

use crate::error::{DispatchError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Delivers one alert message. One attempt, no retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn dispatch(&self, message: &str) -> std::result::Result<(), DispatchError>;
}

#[derive(Debug, Serialize)]
struct AlertPayload<'a> {
    text: &'a str,
}

/// Posts `{"text": message}` to a configured URL
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("hostwarden/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    async fn dispatch(&self, message: &str) -> std::result::Result<(), DispatchError> {
        let response = self
            .client
            .post(&self.url)
            .json(&AlertPayload { text: message })
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status(status.as_u16()));
        }

        tracing::debug!("Alert delivered, sink answered {}", status);
        Ok(())
    }
}
