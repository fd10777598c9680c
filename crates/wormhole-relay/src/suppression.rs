//! Short-lived set of fingerprints whose deletion is being propagated.
//!
//! Deleting a mirror raises a delete event of its own. While a fingerprint
//! sits in this cache, further delete events for the same content are
//! ignored, so one user deletion produces exactly one propagation pass.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::identity::Fingerprint;

type Digest = [u8; 32];

/// Process-wide suppression set. Cloning shares the underlying set.
#[derive(Clone)]
pub struct SuppressionCache {
    entries: Arc<Mutex<HashSet<Digest>>>,
    delay: Duration,
}

impl SuppressionCache {
    /// A cache whose entries are released `delay` after being scheduled.
    pub fn new(delay: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashSet::new())),
            delay,
        }
    }

    /// Insert the fingerprint if absent. Returns false when it was already
    /// present, i.e. another propagation pass owns it.
    pub async fn claim(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.lock().await.insert(fingerprint.digest())
    }

    pub async fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.lock().await.contains(&fingerprint.digest())
    }

    pub async fn release(&self, fingerprint: &Fingerprint) {
        self.entries.lock().await.remove(&fingerprint.digest());
    }

    /// Release the fingerprint after the configured delay without blocking
    /// the caller.
    pub fn release_later(&self, fingerprint: &Fingerprint) {
        let entries = Arc::clone(&self.entries);
        let digest = fingerprint.digest();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            entries.lock().await.remove(&digest);
            tracing::trace!(fingerprint = %hex::encode(digest), "Suppression released");
        });
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claim_is_insert_if_absent() {
        let cache = SuppressionCache::new(Duration::from_secs(5));
        let fp = Fingerprint::from_content("bye");

        assert!(cache.claim(&fp).await);
        assert!(!cache.claim(&fp).await);
        assert!(cache.contains(&fp).await);

        cache.release(&fp).await;
        assert!(!cache.contains(&fp).await);
        assert!(cache.claim(&fp).await);
    }

    #[tokio::test(start_paused = true)]
    async fn release_happens_after_the_delay() {
        let cache = SuppressionCache::new(Duration::from_secs(5));
        let fp = Fingerprint::from_content("bye");
        cache.claim(&fp).await;
        cache.release_later(&fp);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(cache.contains(&fp).await);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn concurrent_claims_have_one_winner() {
        let cache = SuppressionCache::new(Duration::from_secs(5));
        let fp = Fingerprint::from_content("race");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                let fp = fp.clone();
                tokio::spawn(async move { cache.claim(&fp).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(cache.len().await, 1);
    }
}
