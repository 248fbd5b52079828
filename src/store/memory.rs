use super::ListingStore;
use crate::error::{Result, TrackerError};
use crate::models::{
    Alert, AlertFilter, CategoryCount, Listing, ListingFilter, ListingStatus, NewAlert, NewListing,
    PriceHistoryEntry, Stats,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    next_id: i64,
    listings: BTreeMap<i64, Listing>,
    history: Vec<PriceHistoryEntry>,
    alerts: BTreeMap<i64, Alert>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process store used by tests and by runs without `DATABASE_URL`
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sets a listing's status directly, there is no API operation for it
    pub fn set_status(&self, id: i64, status: ListingStatus) -> Result<()> {
        let mut tables = self.lock();
        let listing = tables
            .listings
            .get_mut(&id)
            .ok_or_else(|| TrackerError::listing_not_found(id))?;
        listing.status = status;
        Ok(())
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn create_listing(&self, new: &NewListing) -> Result<Listing> {
        let mut tables = self.lock();
        if tables.listings.values().any(|l| l.url == new.url) {
            return Err(TrackerError::Conflict(format!("{} is already tracked", new.url)));
        }

        let listing = Listing {
            id: tables.next_id(),
            url: new.url.clone(),
            title: new.title.clone(),
            current_price: new.price,
            location: new.location.clone(),
            category: new.category.clone(),
            status: ListingStatus::Active,
            last_checked: None,
            created_at: Utc::now(),
        };
        let entry = PriceHistoryEntry {
            id: tables.next_id(),
            listing_id: listing.id,
            price: listing.current_price,
            recorded_at: listing.created_at,
        };
        tables.listings.insert(listing.id, listing.clone());
        tables.history.push(entry);
        Ok(listing)
    }

    async fn get_listing(&self, id: i64) -> Result<Option<Listing>> {
        Ok(self.lock().listings.get(&id).cloned())
    }

    async fn list_listings(&self, filter: &ListingFilter) -> Result<Vec<Listing>> {
        let tables = self.lock();
        let mut listings: Vec<Listing> = tables
            .listings
            .values()
            .filter(|l| filter.status.map_or(true, |s| l.status == s))
            .filter(|l| {
                filter
                    .category
                    .as_ref()
                    .map_or(true, |c| l.category.as_ref() == Some(c))
            })
            .cloned()
            .collect();
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(listings)
    }

    async fn list_active_listings(&self) -> Result<Vec<Listing>> {
        Ok(self
            .lock()
            .listings
            .values()
            .filter(|l| l.status == ListingStatus::Active)
            .cloned()
            .collect())
    }

    async fn delete_listing(&self, id: i64) -> Result<bool> {
        let mut tables = self.lock();
        if tables.listings.remove(&id).is_none() {
            return Ok(false);
        }
        tables.history.retain(|h| h.listing_id != id);
        tables.alerts.retain(|_, a| a.listing_id != id);
        Ok(true)
    }

    async fn update_listing_price(&self, id: i64, price: f64, checked_at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.lock();
        let listing = tables
            .listings
            .get_mut(&id)
            .ok_or_else(|| TrackerError::listing_not_found(id))?;
        listing.current_price = price;
        listing.last_checked = Some(checked_at);
        Ok(())
    }

    async fn record_price(
        &self,
        id: i64,
        price: f64,
        checked_at: DateTime<Utc>,
    ) -> Result<Option<PriceHistoryEntry>> {
        let mut tables = self.lock();
        let entry_id = tables.next_id();
        let listing = tables
            .listings
            .get_mut(&id)
            .ok_or_else(|| TrackerError::listing_not_found(id))?;

        let changed = listing.current_price != price;
        listing.current_price = price;
        listing.last_checked = Some(checked_at);
        if !changed {
            return Ok(None);
        }

        let entry = PriceHistoryEntry {
            id: entry_id,
            listing_id: id,
            price,
            recorded_at: checked_at,
        };
        tables.history.push(entry.clone());
        Ok(Some(entry))
    }

    async fn append_history(
        &self,
        listing_id: i64,
        price: f64,
        recorded_at: DateTime<Utc>,
    ) -> Result<PriceHistoryEntry> {
        let mut tables = self.lock();
        if !tables.listings.contains_key(&listing_id) {
            return Err(TrackerError::listing_not_found(listing_id));
        }
        let entry = PriceHistoryEntry {
            id: tables.next_id(),
            listing_id,
            price,
            recorded_at,
        };
        tables.history.push(entry.clone());
        Ok(entry)
    }

    async fn get_history(&self, listing_id: i64) -> Result<Vec<PriceHistoryEntry>> {
        let mut history: Vec<PriceHistoryEntry> = self
            .lock()
            .history
            .iter()
            .filter(|h| h.listing_id == listing_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at).then(a.id.cmp(&b.id)));
        Ok(history)
    }

    async fn create_alert(&self, new: &NewAlert) -> Result<Alert> {
        let mut tables = self.lock();
        if !tables.listings.contains_key(&new.listing_id) {
            return Err(TrackerError::listing_not_found(new.listing_id));
        }
        let alert = Alert {
            id: tables.next_id(),
            listing_id: new.listing_id,
            email: new.email.clone(),
            target_price: new.target_price,
            alert_type: new.alert_type,
            active: true,
            triggered_at: None,
            created_at: Utc::now(),
        };
        tables.alerts.insert(alert.id, alert.clone());
        Ok(alert)
    }

    async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .lock()
            .alerts
            .values()
            .filter(|a| filter.listing_id.map_or(true, |id| a.listing_id == id))
            .filter(|a| filter.active.map_or(true, |active| a.active == active))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(alerts)
    }

    async fn get_active_alerts(&self, listing_id: i64) -> Result<Vec<Alert>> {
        Ok(self
            .lock()
            .alerts
            .values()
            .filter(|a| a.listing_id == listing_id && a.active)
            .cloned()
            .collect())
    }

    async fn deactivate_alert(&self, alert_id: i64, triggered_at: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.lock();
        match tables.alerts.get_mut(&alert_id) {
            Some(alert) if alert.active => {
                alert.active = false;
                alert.triggered_at = Some(triggered_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn stats(&self) -> Result<Stats> {
        let tables = self.lock();

        let active: Vec<&Listing> = tables
            .listings
            .values()
            .filter(|l| l.status == ListingStatus::Active)
            .collect();
        let average_price = if active.is_empty() {
            None
        } else {
            Some(active.iter().map(|l| l.current_price).sum::<f64>() / active.len() as f64)
        };

        let mut counts: HashMap<Option<String>, i64> = HashMap::new();
        for listing in tables.listings.values() {
            *counts.entry(listing.category.clone()).or_default() += 1;
        }
        let mut by_category: Vec<CategoryCount> = counts
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect();
        // Same order as the SQL query: count desc, then category with NULL last
        by_category.sort_by(|a, b| {
            b.count.cmp(&a.count).then_with(|| match (&a.category, &b.category) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
        });

        Ok(Stats {
            total_listings: tables.listings.len() as i64,
            active_listings: active.len() as i64,
            total_alerts: tables.alerts.len() as i64,
            active_alerts: tables.alerts.values().filter(|a| a.active).count() as i64,
            triggered_alerts: tables
                .alerts
                .values()
                .filter(|a| a.triggered_at.is_some())
                .count() as i64,
            history_entries: tables.history.len() as i64,
            average_price,
            by_category,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertType;

    fn new_listing(url: &str, price: f64, category: Option<&str>) -> NewListing {
        NewListing {
            url: url.to_string(),
            title: "Bike".to_string(),
            price,
            location: None,
            category: category.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_duplicate_url_is_a_conflict() {
        let store = MemoryStore::new();
        store.create_listing(&new_listing("https://a.test/1", 10.0, None)).await.unwrap();
        let err = store
            .create_listing(&new_listing("https://a.test/1", 12.0, None))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let store = MemoryStore::new();
        let listing = store.create_listing(&new_listing("https://a.test/1", 10.0, None)).await.unwrap();
        store.append_history(listing.id, 10.0, Utc::now()).await.unwrap();
        store
            .create_alert(&NewAlert {
                listing_id: listing.id,
                email: "a@b.test".to_string(),
                target_price: 5.0,
                alert_type: AlertType::PriceDrop,
            })
            .await
            .unwrap();

        assert!(store.delete_listing(listing.id).await.unwrap());
        assert!(!store.delete_listing(listing.id).await.unwrap());
        assert!(store.get_history(listing.id).await.unwrap().is_empty());
        assert!(store.list_alerts(&AlertFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_price_appends_only_on_change() {
        let store = MemoryStore::new();
        let listing = store.create_listing(&new_listing("https://a.test/1", 10.0, None)).await.unwrap();

        assert!(store.record_price(listing.id, 10.0, Utc::now()).await.unwrap().is_none());
        let entry = store.record_price(listing.id, 8.5, Utc::now()).await.unwrap().unwrap();
        assert_eq!(entry.price, 8.5);

        let prices: Vec<f64> = store
            .get_history(listing.id)
            .await
            .unwrap()
            .iter()
            .map(|h| h.price)
            .collect();
        assert_eq!(prices, vec![10.0, 8.5]);

        let stored = store.get_listing(listing.id).await.unwrap().unwrap();
        assert_eq!(stored.current_price, 8.5);
        assert!(stored.last_checked.is_some());

        // Plain price update leaves history alone
        store.update_listing_price(listing.id, 7.0, Utc::now()).await.unwrap();
        assert_eq!(store.get_history(listing.id).await.unwrap().len(), 2);
        assert!(matches!(
            store.record_price(99, 1.0, Utc::now()).await,
            Err(TrackerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_deactivate_only_once() {
        let store = MemoryStore::new();
        let listing = store.create_listing(&new_listing("https://a.test/1", 10.0, None)).await.unwrap();
        let alert = store
            .create_alert(&NewAlert {
                listing_id: listing.id,
                email: "a@b.test".to_string(),
                target_price: 5.0,
                alert_type: AlertType::PriceDrop,
            })
            .await
            .unwrap();

        let first = Utc::now();
        assert!(store.deactivate_alert(alert.id, first).await.unwrap());
        assert!(!store.deactivate_alert(alert.id, Utc::now()).await.unwrap());

        let alerts = store.list_alerts(&AlertFilter::default()).await.unwrap();
        assert_eq!(alerts[0].triggered_at, Some(first));
        assert!(store.get_active_alerts(listing.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stats() {
        let store = MemoryStore::new();
        store.create_listing(&new_listing("https://a.test/1", 10.0, Some("bikes"))).await.unwrap();
        store.create_listing(&new_listing("https://a.test/2", 30.0, Some("bikes"))).await.unwrap();
        let sofa = store.create_listing(&new_listing("https://a.test/3", 99.0, None)).await.unwrap();
        store.set_status(sofa.id, ListingStatus::Inactive).unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_listings, 3);
        assert_eq!(stats.active_listings, 2);
        assert_eq!(stats.average_price, Some(20.0));
        assert_eq!(stats.history_entries, 3);
        assert_eq!(
            stats.by_category,
            vec![
                CategoryCount { category: Some("bikes".to_string()), count: 2 },
                CategoryCount { category: None, count: 1 },
            ]
        );
    }
}
