use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per listing id.
///
/// Holding the guard serialises the whole read-compare-write-evaluate
/// cycle for that listing. Other listings are unaffected.
#[derive(Default)]
pub struct ListingLocks {
    locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl ListingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, listing_id: i64) -> ListingGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(listing_id).or_default().clone()
        };
        ListingGuard {
            owner: self,
            listing_id,
            guard: Some(lock.lock_owned().await),
        }
    }

    fn release(&self, listing_id: i64) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Only the map still holds it: nobody is waiting, drop the entry
        if let Some(lock) = locks.get(&listing_id) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(&listing_id);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}

pub struct ListingGuard<'a> {
    owner: &'a ListingLocks,
    listing_id: i64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ListingGuard<'_> {
    fn drop(&mut self) {
        // Unlock first so the owned Arc is gone before counting references
        self.guard.take();
        self.owner.release(self.listing_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_listing_is_serialised() {
        let locks = Arc::new(ListingLocks::new());
        let guard = locks.acquire(1).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(1).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_other_listings_do_not_block() {
        let locks = ListingLocks::new();
        let _one = locks.acquire(1).await;
        let _two = tokio::time::timeout(Duration::from_millis(50), locks.acquire(2))
            .await
            .expect("listing 2 should not wait for listing 1");
    }
}
