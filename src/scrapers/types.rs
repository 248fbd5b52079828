use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a price source could read off a listing page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapedListing {
    pub title: Option<String>,
    pub price: f64,
    pub location: Option<String>,
    pub category: Option<String>,
}

/// HTTP settings for page fetching
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Whole-request timeout
    pub timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}
