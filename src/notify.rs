//! Webhook alert delivery (Discord embed format)

use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::AlertsConfig;
use crate::error::{Result, ScanError};

/// Embed colour: pure red
const EMBED_COLOR: u32 = 0xFF0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    NotConfigured,
}

/// Posts brute-force alerts to the configured webhook
pub struct Notifier {
    webhook: Option<String>,
    footer: String,
    client: Client,
}

impl Notifier {
    pub fn new(config: &AlertsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ScanError::collaborator("notify", e.to_string()))?;

        Ok(Self {
            webhook: config.webhook().map(str::to_string),
            footer: config.footer.clone(),
            client,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.webhook.is_some()
    }

    /// Deliver one alert; a missing webhook is reported but is not an error
    pub async fn notify(&self, ip: &str, attempts: u64, location: &str) -> Result<NotifyOutcome> {
        let Some(url) = self.webhook.as_deref() else {
            warn!("No Discord webhook URL configured, alert for {} not sent", ip);
            return Ok(NotifyOutcome::NotConfigured);
        };

        let payload = build_payload(ip, attempts, location, &self.footer);
        let resp = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ScanError::collaborator("notify", e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ScanError::collaborator(
                "notify",
                format!("webhook returned {}: {}", status, body.trim()),
            ));
        }

        info!("Alert sent to Discord for {}", ip);
        Ok(NotifyOutcome::Sent)
    }
}

fn build_payload(ip: &str, attempts: u64, location: &str, footer: &str) -> Value {
    json!({
        "embeds": [{
            "title": "🚨 Brute Force Detected",
            "color": EMBED_COLOR,
            "fields": [
                { "name": "IP Address", "value": ip, "inline": true },
                { "name": "Failed Attempts", "value": attempts.to_string(), "inline": true },
                { "name": "Location", "value": location, "inline": false }
            ],
            "footer": { "text": footer },
            "timestamp": Utc::now().to_rfc3339()
        }]
    })
}
