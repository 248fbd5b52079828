use crate::error::Result;
use crate::scrapers::types::ScrapedListing;
use async_trait::async_trait;

/// Where observed prices come from.
/// Adapters for new sites implement this and nothing else changes.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch everything the source knows about the listing at `url`
    async fn fetch_listing(&self, url: &str) -> Result<ScrapedListing>;

    /// Fetch just the current price
    async fn fetch_current_price(&self, url: &str) -> Result<f64> {
        Ok(self.fetch_listing(url).await?.price)
    }

    /// Get the name of the price source
    fn source_name(&self) -> &'static str;
}
