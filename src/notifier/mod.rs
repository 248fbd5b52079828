pub mod email;
pub mod log;

pub use email::{EmailNotifier, MailRelayConfig};
pub use self::log::LogNotifier;

use crate::error::Result;
use crate::models::{Alert, Listing};
use async_trait::async_trait;

/// Delivers a message for a fired alert
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert, listing: &Listing, current_price: f64) -> Result<()>;
}

/// A rendered alert message
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl AlertMessage {
    pub fn render(alert: &Alert, listing: &Listing, current_price: f64) -> Self {
        let subject = format!("Price alert: {}", listing.title);
        let body = format!(
            "Good news! The price of \"{}\" has dropped.\n\n\
             Current price: {:.2}\n\
             Your target:   {:.2}\n\n\
             View the listing: {}\n\n\
             This alert has now been switched off.",
            listing.title, current_price, alert.target_price, listing.url
        );

        Self {
            to: alert.email.clone(),
            subject,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertType, ListingStatus};
    use chrono::Utc;

    #[test]
    fn test_message_formatting() {
        let listing = Listing {
            id: 7,
            url: "https://shop.test/items/7".to_string(),
            title: "Espresso machine".to_string(),
            current_price: 100.0,
            location: None,
            category: None,
            status: ListingStatus::Active,
            last_checked: None,
            created_at: Utc::now(),
        };
        let alert = Alert {
            id: 1,
            listing_id: 7,
            email: "me@home.test".to_string(),
            target_price: 90.0,
            alert_type: AlertType::PriceDrop,
            active: true,
            triggered_at: None,
            created_at: Utc::now(),
        };

        let message = AlertMessage::render(&alert, &listing, 89.5);

        assert_eq!(message.to, "me@home.test");
        assert_eq!(message.subject, "Price alert: Espresso machine");
        assert!(message.body.contains("Current price: 89.50"));
        assert!(message.body.contains("Your target:   90.00"));
        assert!(message.body.contains("https://shop.test/items/7"));
    }
}
