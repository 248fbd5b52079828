use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tracking status of a listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Inactive,
    Removed,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Inactive => "inactive",
            ListingStatus::Removed => "removed",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ListingStatus::Active),
            "inactive" => Ok(ListingStatus::Inactive),
            "removed" => Ok(ListingStatus::Removed),
            other => Err(format!("unknown listing status '{}'", other)),
        }
    }
}

/// Kind of alert. Only price drops exist for now.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    #[default]
    PriceDrop,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::PriceDrop => "price_drop",
        }
    }

    /// Whether an alert of this type with `target` fires at `price`
    pub fn fires(&self, price: f64, target: f64) -> bool {
        match self {
            AlertType::PriceDrop => price <= target,
        }
    }
}

impl FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price_drop" => Ok(AlertType::PriceDrop),
            other => Err(format!("unknown alert type '{}'", other)),
        }
    }
}

/// A tracked listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub current_price: f64,
    pub location: Option<String>,
    pub category: Option<String>,
    pub status: ListingStatus,
    pub last_checked: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to start tracking a listing
#[derive(Debug, Clone)]
pub struct NewListing {
    pub url: String,
    pub title: String,
    pub price: f64,
    pub location: Option<String>,
    pub category: Option<String>,
}

/// One recorded price observation, append-only
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceHistoryEntry {
    pub id: i64,
    pub listing_id: i64,
    pub price: f64,
    pub recorded_at: DateTime<Utc>,
}

/// A user's price threshold on one listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: i64,
    pub listing_id: i64,
    pub email: String,
    pub target_price: f64,
    pub alert_type: AlertType,
    pub active: bool,
    pub triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn fires_at(&self, price: f64) -> bool {
        self.active && self.alert_type.fires(price, self.target_price)
    }
}

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub listing_id: i64,
    pub email: String,
    pub target_price: f64,
    pub alert_type: AlertType,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingFilter {
    pub status: Option<ListingStatus>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertFilter {
    pub listing_id: Option<i64>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryCount {
    pub category: Option<String>,
    pub count: i64,
}

/// Aggregate numbers for the dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Stats {
    pub total_listings: i64,
    pub active_listings: i64,
    pub total_alerts: i64,
    pub active_alerts: i64,
    pub triggered_alerts: i64,
    pub history_entries: i64,
    pub average_price: Option<f64>,
    pub by_category: Vec<CategoryCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_drop_fires_at_target() {
        assert!(AlertType::PriceDrop.fires(90.0, 90.0));
        assert!(AlertType::PriceDrop.fires(89.99, 90.0));
        assert!(!AlertType::PriceDrop.fires(90.01, 90.0));
    }

    #[test]
    fn test_status_strings() {
        for status in [ListingStatus::Active, ListingStatus::Inactive, ListingStatus::Removed] {
            assert_eq!(status.as_str().parse::<ListingStatus>(), Ok(status));
        }
        assert!("gone".parse::<ListingStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&AlertType::PriceDrop).unwrap(),
            "\"price_drop\""
        );
    }
}
