use crate::error::Result;
use crate::models::Listing;
use crate::tracker::{IngestOutcome, PriceTracker};
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

/// Tally of one pass over the active listings
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SweepReport {
    pub checked: usize,
    pub changed: usize,
    pub fired: usize,
    pub failed: usize,
}

/// Re-checks every active listing, one at a time
pub struct Sweeper {
    tracker: Arc<PriceTracker>,
    delay: Duration,
    running: Mutex<()>,
}

impl Sweeper {
    pub fn new(tracker: Arc<PriceTracker>, delay: Duration) -> Self {
        Self {
            tracker,
            delay,
            running: Mutex::new(()),
        }
    }

    /// One pass over all active listings.
    ///
    /// Items run serially with `delay` between them. A failing item is
    /// logged and counted, the rest still run. If a pass is already in
    /// progress this returns an empty report straight away.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let Ok(_running) = self.running.try_lock() else {
            warn!("Previous sweep still running, skipping this one");
            return Ok(SweepReport::default());
        };

        let listings = self.tracker.store().list_active_listings().await?;
        info!(
            "🔄 Sweeping {} active listings via {} source",
            listings.len(),
            self.tracker.source().source_name()
        );

        let mut report = SweepReport::default();
        for (i, listing) in listings.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            report.checked += 1;
            match self.refresh(listing).await {
                Ok(outcome) => {
                    debug!(
                        "Listing {} checked: {:.2} (changed: {})",
                        listing.id, outcome.price, outcome.changed
                    );
                    report.changed += outcome.changed as usize;
                    report.fired += outcome.fired.len();
                }
                Err(e) => {
                    report.failed += 1;
                    error!("Failed to check listing {} ({}): {}", listing.id, listing.url, e);
                }
            }
        }

        info!(
            "✅ Sweep done: {} checked, {} changed, {} alerts fired, {} failed",
            report.checked, report.changed, report.fired, report.failed
        );
        Ok(report)
    }

    async fn refresh(&self, listing: &Listing) -> Result<IngestOutcome> {
        let price = self.tracker.source().fetch_current_price(&listing.url).await?;
        self.tracker.ingest(listing.id, price).await
    }

    /// Run [`Sweeper::sweep`] on `cron` (with a seconds field)
    pub async fn schedule(self: Arc<Self>, cron: &str) -> anyhow::Result<JobScheduler> {
        let sched = JobScheduler::new().await.context("creating scheduler")?;

        let job = Job::new_async(cron, move |_uuid, _l| {
            let sweeper = self.clone();
            Box::pin(async move {
                if let Err(e) = sweeper.sweep().await {
                    error!("Scheduled sweep failed: {}", e);
                }
            })
        })
        .with_context(|| format!("creating sweep job for cron {cron}"))?;

        sched.add(job).await.context("adding sweep job")?;
        sched.start().await.context("starting scheduler")?;

        info!("⏰ Sweep scheduled: {}", cron);
        Ok(sched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ListingStatus, NewListing};
    use crate::scrapers::MockPriceSource;
    use crate::store::{ListingStore, MemoryStore};
    use crate::tracker::tests::RecordingNotifier;

    async fn add_listing(store: &MemoryStore, url: &str, price: f64) -> i64 {
        store
            .create_listing(&NewListing {
                url: url.to_string(),
                title: "Lamp".to_string(),
                price,
                location: None,
                category: None,
            })
            .await
            .unwrap()
            .id
    }

    fn sweeper(store: Arc<MemoryStore>, source: Arc<MockPriceSource>, delay: Duration) -> Sweeper {
        let tracker = Arc::new(PriceTracker::new(
            store,
            Arc::new(RecordingNotifier::default()),
            source,
        ));
        Sweeper::new(tracker, delay)
    }

    #[tokio::test]
    async fn test_sweep_skips_inactive_listings() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(MockPriceSource::new());
        let a = add_listing(&store, "https://shop.test/a", 10.0).await;
        let b = add_listing(&store, "https://shop.test/b", 20.0).await;
        store.set_status(b, ListingStatus::Inactive).unwrap();
        source.set_price("https://shop.test/a", 9.0);
        source.set_price("https://shop.test/b", 1.0);

        let report = sweeper(store.clone(), source, Duration::ZERO).sweep().await.unwrap();

        assert_eq!(report.checked, 1);
        assert_eq!(report.changed, 1);
        assert_eq!(store.get_listing(a).await.unwrap().unwrap().current_price, 9.0);
        let untouched = store.get_listing(b).await.unwrap().unwrap();
        assert_eq!(untouched.current_price, 20.0);
        assert_eq!(untouched.last_checked, None);
    }

    #[tokio::test]
    async fn test_failed_item_does_not_abort_sweep() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(MockPriceSource::new());
        add_listing(&store, "https://shop.test/down", 10.0).await;
        let up = add_listing(&store, "https://shop.test/up", 10.0).await;
        source.set_unavailable("https://shop.test/down");
        source.set_price("https://shop.test/up", 8.0);

        let report = sweeper(store.clone(), source, Duration::ZERO).sweep().await.unwrap();

        assert_eq!(report, SweepReport { checked: 2, changed: 1, fired: 0, failed: 1 });
        assert_eq!(store.get_listing(up).await.unwrap().unwrap().current_price, 8.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_items() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(MockPriceSource::new());
        for i in 0..3 {
            add_listing(&store, &format!("https://shop.test/{i}"), 10.0).await;
        }

        let started = tokio::time::Instant::now();
        let report = sweeper(store, source, Duration::from_secs(2)).sweep().await.unwrap();

        assert_eq!(report.checked, 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(4) && elapsed < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_sweep_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(MockPriceSource::new());
        for i in 0..2 {
            add_listing(&store, &format!("https://shop.test/{i}"), 10.0).await;
        }
        let sweeper = Arc::new(sweeper(store, source, Duration::from_secs(5)));

        let first = tokio::spawn({
            let sweeper = sweeper.clone();
            async move { sweeper.sweep().await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;

        let second = sweeper.sweep().await.unwrap();
        assert_eq!(second, SweepReport::default());
        assert_eq!(first.await.unwrap().unwrap().checked, 2);
    }
}
