use crate::error::{Result, TrackerError};
use crate::scrapers::traits::PriceSource;
use crate::scrapers::types::ScrapedListing;
use async_trait::async_trait;
use rand::Rng;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
enum Scripted {
    Price(f64),
    Unavailable,
}

/// Stand-in price source that never touches the network.
///
/// Scripted URLs return exactly what was scripted. Anything else gets a
/// stable price derived from the URL, optionally nudged by up to ±5%.
#[derive(Default)]
pub struct MockPriceSource {
    scripted: Mutex<HashMap<String, Scripted>>,
    drift: bool,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unscripted prices wander a little on every fetch
    pub fn with_drift() -> Self {
        Self {
            drift: true,
            ..Self::default()
        }
    }

    pub fn set_price(&self, url: &str, price: f64) {
        self.script(url, Scripted::Price(price));
    }

    /// Make fetches of `url` fail as if the site were down
    pub fn set_unavailable(&self, url: &str) {
        self.script(url, Scripted::Unavailable);
    }

    fn script(&self, url: &str, entry: Scripted) {
        self.scripted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(url.to_string(), entry);
    }

    fn scripted(&self, url: &str) -> Option<Scripted> {
        self.scripted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(url)
            .copied()
    }

    fn generated_price(&self, url: &str) -> f64 {
        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        let base = 10.0 + (hasher.finish() % 99_000) as f64 / 100.0;

        if !self.drift {
            return base;
        }
        let factor = 1.0 + rand::rng().random_range(-0.05..=0.05);
        (base * factor * 100.0).round() / 100.0
    }
}

/// Readable title from the last path segment of a URL
fn title_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next()?;
    let after_scheme = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    let (_host, path) = after_scheme.split_once('/')?;
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let title = segment.replace(['-', '_'], " ");
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn fetch_listing(&self, url: &str) -> Result<ScrapedListing> {
        let price = match self.scripted(url) {
            Some(Scripted::Price(price)) => price,
            Some(Scripted::Unavailable) => {
                return Err(TrackerError::Upstream(format!("{} is unavailable", url)));
            }
            None => self.generated_price(url),
        };
        debug!("Mock price for {}: {:.2}", url, price);

        Ok(ScrapedListing {
            title: title_from_url(url),
            price,
            location: None,
            category: None,
        })
    }

    fn source_name(&self) -> &'static str {
        "mock"
    }
}
