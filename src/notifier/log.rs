use super::{AlertMessage, Notifier};
use crate::error::Result;
use crate::models::{Alert, Listing};
use async_trait::async_trait;
use tracing::info;

/// Writes alert messages to the log instead of sending them
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &Alert, listing: &Listing, current_price: f64) -> Result<()> {
        let message = AlertMessage::render(alert, listing, current_price);
        info!(
            to = %message.to,
            subject = %message.subject,
            "📧 Alert {} fired (no mail relay configured)\n{}",
            alert.id,
            message.body
        );
        Ok(())
    }
}
