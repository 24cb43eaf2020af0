//! Notification capability over a JSON mail-API endpoint.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;
use url::Url;

use super::{CapabilityError, Notifier};

pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    from: String,
}

impl HttpNotifier {
    pub fn new(endpoint: Url, api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

impl std::fmt::Debug for HttpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpNotifier")
            .field("endpoint", &self.endpoint.as_str())
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), CapabilityError> {
        self.client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "html": html_body,
            }))
            .send()
            .await?
            .error_for_status()?;
        debug!(to, subject, "notification sent");
        Ok(())
    }
}

/// No-op notifier for deployments without a mail endpoint.
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, to: &str, subject: &str, _html_body: &str) -> Result<(), CapabilityError> {
        debug!(to, subject, "notifications disabled, dropping message");
        Ok(())
    }
}
