pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::Result;
use crate::models::{
    Alert, AlertFilter, Listing, ListingFilter, NewAlert, NewListing, PriceHistoryEntry, Stats,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Relational store for listings, their price history and alerts.
///
/// Deleting a listing removes its history and alerts with it.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Inserts the listing together with its first history entry.
    /// Fails with `Conflict` if the URL is already tracked.
    async fn create_listing(&self, listing: &NewListing) -> Result<Listing>;

    async fn get_listing(&self, id: i64) -> Result<Option<Listing>>;

    async fn list_listings(&self, filter: &ListingFilter) -> Result<Vec<Listing>>;

    /// Listings with `status = active`, oldest first
    async fn list_active_listings(&self) -> Result<Vec<Listing>>;

    /// Returns false if no such listing existed
    async fn delete_listing(&self, id: i64) -> Result<bool>;

    async fn update_listing_price(&self, id: i64, price: f64, checked_at: DateTime<Utc>) -> Result<()>;

    /// Set the listing's price and last-checked time, appending a history
    /// entry if the price differs from the stored one. Both writes land
    /// together or not at all. Returns the appended entry, if any.
    async fn record_price(
        &self,
        id: i64,
        price: f64,
        checked_at: DateTime<Utc>,
    ) -> Result<Option<PriceHistoryEntry>>;

    async fn append_history(
        &self,
        listing_id: i64,
        price: f64,
        recorded_at: DateTime<Utc>,
    ) -> Result<PriceHistoryEntry>;

    /// History in chronological order
    async fn get_history(&self, listing_id: i64) -> Result<Vec<PriceHistoryEntry>>;

    async fn create_alert(&self, alert: &NewAlert) -> Result<Alert>;

    async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>>;

    async fn get_active_alerts(&self, listing_id: i64) -> Result<Vec<Alert>>;

    /// Marks an active alert as fired. Returns false if it was already inactive.
    async fn deactivate_alert(&self, alert_id: i64, triggered_at: DateTime<Utc>) -> Result<bool>;

    async fn stats(&self) -> Result<Stats>;
}
