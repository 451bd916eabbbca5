//! # Webhook delivery channel
//!
//! Bridges the core [`DeliveryChannel`] contract to an HTTP webhook. A batch is posted as one
//! multipart request: a `content` text field holding the batch label and one `files[N]` part per
//! media file. The webhook answers with JSON carrying the message `id`, which becomes the
//! correlation id used later to delete the message on undo (`DELETE {url}/messages/{id}`).
//!
//! Status mapping: `413` is a payload-too-large rejection, `404` means the message is gone,
//! everything else non-2xx is an ordinary delivery failure.

use async_trait::async_trait;
use batchcast::catalog::MediaFile;
use batchcast::contract::{CorrelationId, DeliveryChannel, DeliveryError};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::load_config::WEBHOOK_URL_ENV;

pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    id: serde_json::Value,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        tracing::info!(url_set = !url.is_empty(), "Initialised WebhookChannel");
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    fn message_url(&self, correlation_id: &str) -> String {
        format!("{}/messages/{}", self.url, correlation_id)
    }

    async fn build_form(batch: &[MediaFile], label: &str) -> Result<Form, DeliveryError> {
        let mut form = Form::new().text("content", label.to_string());
        for (i, file) in batch.iter().enumerate() {
            let bytes = tokio::fs::read(&file.path).await.map_err(|e| {
                DeliveryError::Other(format!("could not read {}: {e}", file.filename))
            })?;
            let part = Part::bytes(bytes).file_name(file.filename.clone());
            form = form.part(format!("files[{i}]"), part);
        }
        Ok(form)
    }
}

/// Translate a non-success HTTP status into the delivery error taxonomy.
pub fn classify_status(status: StatusCode, body: &str) -> DeliveryError {
    let detail = format!("{status}: {body}");
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => DeliveryError::PayloadTooLarge(detail),
        StatusCode::NOT_FOUND => DeliveryError::NotFound(detail),
        _ => DeliveryError::Other(detail),
    }
}

fn id_to_string(id: serde_json::Value) -> Option<String> {
    match id {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl DeliveryChannel for WebhookChannel {
    async fn send(&self, batch: &[MediaFile], label: &str) -> Result<CorrelationId, DeliveryError> {
        tracing::info!(files = batch.len(), label, "Posting batch to webhook");
        let form = Self::build_form(batch, label).await?;

        let resp = self
            .client
            .post(&self.url)
            .query(&[("wait", "true")])
            .multipart(form)
            .send()
            .await
            .map_err(|e| DeliveryError::Other(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, "Webhook rejected batch");
            return Err(classify_status(status, &body));
        }

        let parsed: MessageResponse = resp
            .json()
            .await
            .map_err(|e| DeliveryError::Other(format!("unreadable webhook response: {e}")))?;
        let id = id_to_string(parsed.id)
            .ok_or_else(|| DeliveryError::Other("webhook response carried no message id".into()))?;
        tracing::info!(message_id = %id, "Webhook accepted batch");
        Ok(id)
    }

    async fn delete_message(&self, correlation_id: &str) -> Result<(), DeliveryError> {
        tracing::info!(message_id = correlation_id, "Deleting webhook message");
        let resp = self
            .client
            .delete(self.message_url(correlation_id))
            .send()
            .await
            .map_err(|e| DeliveryError::Other(format!("request failed: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }
}

/// Stand-in for commands that never deliver, so they run without a webhook configured.
pub struct OfflineChannel;

#[async_trait]
impl DeliveryChannel for OfflineChannel {
    async fn send(&self, _batch: &[MediaFile], _label: &str) -> Result<CorrelationId, DeliveryError> {
        Err(DeliveryError::Other(format!("{WEBHOOK_URL_ENV} is not set")))
    }

    async fn delete_message(&self, _correlation_id: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::Other(format!("{WEBHOOK_URL_ENV} is not set")))
    }
}
