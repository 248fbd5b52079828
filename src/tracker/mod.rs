//! Price observation ingest and alert evaluation.
//!
//! A listing's price only ever moves through [`PriceTracker::ingest`], which
//! records history on change and fires the listing's alerts.

mod alerts;
mod locks;

pub use locks::ListingLocks;

use crate::error::{validate_price, Result, TrackerError};
use crate::models::{Alert, Listing};
use crate::notifier::Notifier;
use crate::scrapers::PriceSource;
use crate::store::ListingStore;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of feeding one observed price into a listing
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IngestOutcome {
    pub listing_id: i64,
    pub previous_price: f64,
    pub price: f64,
    pub changed: bool,
    /// Alerts that fired because of this observation
    pub fired: Vec<Alert>,
}

pub struct PriceTracker {
    store: Arc<dyn ListingStore>,
    notifier: Arc<dyn Notifier>,
    source: Arc<dyn PriceSource>,
    locks: ListingLocks,
}

impl PriceTracker {
    pub fn new(
        store: Arc<dyn ListingStore>,
        notifier: Arc<dyn Notifier>,
        source: Arc<dyn PriceSource>,
    ) -> Self {
        Self {
            store,
            notifier,
            source,
            locks: ListingLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ListingStore> {
        &self.store
    }

    pub fn source(&self) -> &Arc<dyn PriceSource> {
        &self.source
    }

    /// Record `observed_price` for a listing.
    ///
    /// The listing's price and last-checked time are always updated. Only a
    /// different price appends history and evaluates alerts. Nothing is
    /// written if a store read fails, so a failed ingest can be retried.
    pub async fn ingest(&self, listing_id: i64, observed_price: f64) -> Result<IngestOutcome> {
        let price = validate_price("price", observed_price)?;

        let _guard = self.locks.acquire(listing_id).await;

        let listing = self.load_listing(listing_id).await?;
        let previous_price = listing.current_price;
        let candidates = if price != previous_price {
            self.store.get_active_alerts(listing_id).await?
        } else {
            Vec::new()
        };

        let now = Utc::now();
        if self.store.record_price(listing_id, price, now).await?.is_none() {
            debug!("Listing {} unchanged at {:.2}", listing_id, price);
            return Ok(IngestOutcome {
                listing_id,
                previous_price,
                price,
                changed: false,
                fired: Vec::new(),
            });
        }

        info!(
            "💰 Listing {} price changed: {:.2} -> {:.2}",
            listing_id, previous_price, price
        );

        let listing = Listing {
            current_price: price,
            last_checked: Some(now),
            ..listing
        };
        let fired = self.fire_alerts(&listing, price, candidates).await;

        Ok(IngestOutcome {
            listing_id,
            previous_price,
            price,
            changed: true,
            fired,
        })
    }

    /// Fire every active alert on the listing whose target `current_price` meets
    pub async fn evaluate(&self, listing_id: i64, current_price: f64) -> Result<Vec<Alert>> {
        let current_price = validate_price("price", current_price)?;

        let _guard = self.locks.acquire(listing_id).await;
        let listing = self.load_listing(listing_id).await?;
        let candidates = self.store.get_active_alerts(listing_id).await?;
        Ok(self.fire_alerts(&listing, current_price, candidates).await)
    }

    /// Fetch a fresh price from the source and ingest it
    pub async fn check(&self, listing_id: i64) -> Result<IngestOutcome> {
        let listing = self.load_listing(listing_id).await?;
        let price = self.source.fetch_current_price(&listing.url).await?;
        self.ingest(listing_id, price).await
    }

    async fn load_listing(&self, listing_id: i64) -> Result<Listing> {
        self.store
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| TrackerError::listing_not_found(listing_id))
    }
}
