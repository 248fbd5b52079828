use super::{AlertMessage, Notifier};
use crate::error::{Result, TrackerError};
use crate::models::{Alert, Listing};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Where and how to hand mail over to the relay
#[derive(Debug, Clone)]
pub struct MailRelayConfig {
    pub url: String,
    pub token: Option<String>,
    pub from: String,
}

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Sends alert e-mails through an HTTP mail relay
pub struct EmailNotifier {
    client: Client,
    config: MailRelayConfig,
}

impl EmailNotifier {
    pub fn new(config: MailRelayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TrackerError::Notify(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, alert: &Alert, listing: &Listing, current_price: f64) -> Result<()> {
        let message = AlertMessage::render(alert, listing, current_price);
        let payload = RelayRequest {
            from: &self.config.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.body,
        };

        debug!("Posting alert {} to mail relay {}", alert.id, self.config.url);

        let mut request = self.client.post(&self.config.url).json(&payload);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TrackerError::Notify(format!("mail relay unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(TrackerError::Notify(format!(
                "mail relay returned status {}",
                response.status()
            )));
        }

        info!("📧 Sent alert {} to {}", alert.id, message.to);
        Ok(())
    }
}
