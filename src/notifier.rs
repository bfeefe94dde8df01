use crate::{
    configs::NotifierConfig,
    error::{AppResult, ErrorReason},
    http_client::HttpClient,
    types::Endpoint,
};
use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::Uri;
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Delivers an alert for an endpoint that just went down.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, endpoint: &Endpoint, reason: &str) -> AppResult<()>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub endpoint: Endpoint,
    pub reason: String,
    pub subject: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    pub time: DateTime<Utc>,
}

impl Alert {
    pub fn service_down(
        endpoint: &Endpoint,
        reason: &str,
        recipient: Option<String>,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            endpoint: endpoint.clone(),
            reason: reason.to_owned(),
            subject: format!("[Health Check Alert] Service Down: {}", endpoint),
            text: format!(
                "The service at the following URL is down:\n\n{}\n\nError: {}\nTime: {}",
                endpoint,
                reason,
                time.format(HTTP_DATE)
            ),
            recipient,
            time,
        }
    }
}

/// Posts each alert as JSON to a webhook.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: HttpClient,
    url: Uri,
    recipient: Option<String>,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(client: HttpClient, url: Uri, recipient: Option<String>, timeout: Duration) -> Self {
        Self {
            client,
            url,
            recipient,
            timeout,
        }
    }

    async fn deliver(&self, alert: &Alert) -> AppResult<()> {
        let body = serde_json::to_vec(alert)?;
        let response = self.client.post_json(&self.url, body).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ErrorReason::UnexpectedStatus(status).into())
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, endpoint: &Endpoint, reason: &str) -> AppResult<()> {
        let alert = Alert::service_down(endpoint, reason, self.recipient.clone(), Utc::now());
        timeout(self.timeout, self.deliver(&alert))
            .await
            .map_err(|_| ErrorReason::Timeout)??;
        info!("Alert for {} delivered to {}", endpoint, self.url);
        Ok(())
    }
}

/// Used when no alert channel is configured: the alert is only logged.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, endpoint: &Endpoint, reason: &str) -> AppResult<()> {
        warn!(
            "Alert channel not configured, skipping notification: {} is down ({})",
            endpoint, reason
        );
        Ok(())
    }
}

pub fn build_notifier(config: &NotifierConfig, client: HttpClient) -> AnyResult<Arc<dyn Notifier>> {
    let Some(url) = config.webhook_url.as_deref().filter(|url| !url.trim().is_empty()) else {
        warn!("No notifier webhook configured, alerts will only be logged");
        return Ok(Arc::new(LogNotifier));
    };

    let url = Endpoint::new(url)
        .to_uri()
        .context("Invalid notifier webhook URL")?;
    Ok(Arc::new(WebhookNotifier::new(
        client,
        url,
        config.recipient.clone(),
        config.timeout,
    )))
}
