use super::PriceTracker;
use crate::models::{Alert, Listing};
use chrono::Utc;
use tracing::{error, info, warn};

impl PriceTracker {
    /// Caller holds the listing's lock.
    ///
    /// Delivery is best effort: a failed notification is logged and the
    /// alert is switched off anyway. Alerts are handled independently, so
    /// nothing here fails the caller.
    pub(super) async fn fire_alerts(
        &self,
        listing: &Listing,
        current_price: f64,
        candidates: Vec<Alert>,
    ) -> Vec<Alert> {
        let mut fired = Vec::new();

        for alert in candidates.into_iter().filter(|a| a.fires_at(current_price)) {
            info!(
                "🔔 Alert {} on listing {} hit: {:.2} <= {:.2}",
                alert.id, listing.id, current_price, alert.target_price
            );

            if let Err(e) = self.notifier.notify(&alert, listing, current_price).await {
                warn!("Failed to notify {} for alert {}: {}", alert.email, alert.id, e);
            }

            let triggered_at = Utc::now();
            match self.store.deactivate_alert(alert.id, triggered_at).await {
                Ok(true) => fired.push(Alert {
                    active: false,
                    triggered_at: Some(triggered_at),
                    ..alert
                }),
                Ok(false) => warn!("Alert {} was already inactive", alert.id),
                Err(e) => error!("Failed to deactivate alert {}: {}", alert.id, e),
            }
        }

        fired
    }
}
