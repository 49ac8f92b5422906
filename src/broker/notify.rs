use crate::error::{Result, RippleError};
use reqwest::blocking::Client;
use serde_json::json;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = "ripple/0.1.0";

/// Fire-and-forget message delivery. Failures are reported by the caller
/// as warnings and never fail a work item.
pub trait Notifier: Send + Sync {
    fn notify(&self, text: &str) -> Result<()>;
}

/// Posts a JSON payload to a chat webhook.
#[derive(Debug)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|_| RippleError::Validation(format!("Invalid webhook URL: {url}")))?;

        match parsed.scheme() {
            "https" | "http" => {}
            scheme => {
                return Err(RippleError::Validation(format!(
                    "Unsupported webhook scheme: {scheme}"
                )));
            }
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RippleError::Notification(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "text": text }))
            .send()
            .map_err(|e| RippleError::Notification(format!("webhook delivery failed: {e}")))?;

        if !response.status().is_success() {
            return Err(RippleError::Notification(format!(
                "webhook returned HTTP {}",
                response.status()
            )));
        }

        Ok(())
    }
}
