use crate::store::memory::MemoryCache;
use std::time::Duration;
use tracing::debug;

/// Suppresses repeats of an identical error report inside a time window.
pub struct RecentErrorFilter {
    window: Duration,
    seen: MemoryCache<String, ()>,
}

impl RecentErrorFilter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: MemoryCache::new(),
        }
    }

    /// Returns `true` the first time `fingerprint` is seen within the window.
    pub async fn admit(&self, fingerprint: &str) -> bool {
        self.seen.purge_expired().await;
        let admitted = self
            .seen
            .insert_if_absent(fingerprint.to_string(), (), Some(self.window))
            .await;
        if !admitted {
            debug!("Dropping repeated error report");
        }
        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::Arc;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_repeats_within_window_are_dropped() {
        let filter = RecentErrorFilter::new(Duration::from_millis(30));
        assert!(filter.admit("TypeError|x is undefined").await);
        assert!(!filter.admit("TypeError|x is undefined").await);
        assert!(filter.admit("RangeError|bad index").await);

        sleep(Duration::from_millis(40)).await;
        assert!(filter.admit("TypeError|x is undefined").await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_identical_reports_admit_once() {
        let filter = Arc::new(RecentErrorFilter::new(Duration::from_secs(10)));
        let tasks = (0..16).map(|_| {
            let filter = filter.clone();
            tokio::spawn(async move { filter.admit("TypeError|x is undefined").await })
        });

        let admitted = join_all(tasks)
            .await
            .into_iter()
            .map(|result| result.unwrap())
            .filter(|admitted| *admitted)
            .count();
        assert_eq!(admitted, 1);
    }
}
