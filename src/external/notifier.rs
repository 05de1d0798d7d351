use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{upstream_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    BidAccepted,
    CreditsPurchased,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: Uuid,
    pub event: Event,
    pub payload: Value,
}

/// Delivers notifications. Callers treat delivery as best effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), Error>;
}

/// Writes notifications to the log.
#[derive(Clone, Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), Error> {
        tracing::info!(
            recipient = %notification.recipient,
            event = ?notification.event,
            payload = %notification.payload,
            "notification"
        );

        Ok(())
    }
}

/// Posts notifications as JSON to a webhook without waiting for the response.
#[derive(Clone, Debug)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

async fn deliver(
    client: reqwest::Client,
    url: String,
    notification: Notification,
) -> Result<(), Error> {
    let res = client.post(url).json(&notification).send().await?;

    if !res.status().is_success() {
        return Err(upstream_error());
    }

    Ok(())
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[tracing::instrument(skip(self))]
    async fn notify(&self, notification: Notification) -> Result<(), Error> {
        let client = self.client.clone();
        let url = self.url.clone();

        tokio::spawn(async move {
            if let Err(err) = deliver(client, url, notification).await {
                tracing::warn!(%err, "webhook delivery failed");
            }
        });

        Ok(())
    }
}
