//! Outbound notifications for endorsement events.
//!
//! Delivery is fire-and-forget from the pipeline's point of view; a failed
//! post is logged and dropped, never retried into the message flow.

use async_trait::async_trait;
use tracing::debug;

use crate::error::NotifyError;
use crate::store::model::Endorsement;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn endorsement_created(&self, endorsement: &Endorsement) -> Result<(), NotifyError>;
}

/// Posts endorsement events as JSON to a configured HTTP endpoint.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn endorsement_created(&self, endorsement: &Endorsement) -> Result<(), NotifyError> {
        let body = serde_json::json!({
            "event": "endorsement_created",
            "endorsement": endorsement,
        });
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(NotifyError::Rejected {
                url: self.url.clone(),
                status: resp.status().as_u16(),
            });
        }
        debug!(endorsement = %endorsement.id, "Endorsement event delivered");
        Ok(())
    }
}
