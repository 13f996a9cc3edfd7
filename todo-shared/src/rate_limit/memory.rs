//! Process-local counter store.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::{CounterStore, Hit, RateLimitError};

struct Window {
    count: u64,
    started: Instant,
    length: Duration,
}

impl Window {
    fn ends_at(&self) -> Instant {
        self.started + self.length
    }
}

/// Fixed-window counters in a mutex-guarded map
///
/// Counters are lost on restart and are not shared between processes.
#[derive(Clone, Default)]
pub struct MemoryCounterStore {
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops windows that have already ended
    ///
    /// Safe to call from a background task at any interval.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.windows.lock().retain(|_, window| window.ends_at() > now);
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.windows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<Hit, RateLimitError> {
        let now = Instant::now();
        let mut windows = self.windows.lock();

        let entry = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: now,
            length: window,
        });

        // Start a new window once the old one has ended
        if now >= entry.ends_at() {
            entry.count = 0;
            entry.started = now;
            entry.length = window;
        }

        entry.count += 1;

        Ok(Hit {
            count: entry.count,
            reset_after: entry.ends_at().saturating_duration_since(now),
        })
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_within_window() {
        let store = MemoryCounterStore::new();
        let window = Duration::from_secs(60);

        for expected in 1..=5 {
            let hit = store.hit("k", window).await.unwrap();
            assert_eq!(hit.count, expected);
            assert!(hit.reset_after <= window);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_expiry() {
        let store = MemoryCounterStore::new();
        let window = Duration::from_secs(60);

        store.hit("k", window).await.unwrap();
        store.hit("k", window).await.unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        let hit = store.hit("k", window).await.unwrap();
        assert_eq!(hit.count, 3);
        assert_eq!(hit.reset_after, Duration::from_secs(30));

        tokio::time::advance(Duration::from_secs(31)).await;
        let hit = store.hit("k", window).await.unwrap();
        assert_eq!(hit.count, 1);
        assert_eq!(hit.reset_after, window);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_drops_ended_windows() {
        let store = MemoryCounterStore::new();

        store.hit("short", Duration::from_secs(1)).await.unwrap();
        store.hit("long", Duration::from_secs(3600)).await.unwrap();
        assert_eq!(store.len(), 2);

        tokio::time::advance(Duration::from_secs(2)).await;
        store.cleanup();

        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_hits_are_all_counted() {
        let store = MemoryCounterStore::new();
        let window = Duration::from_secs(60);

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.hit("shared", window).await.unwrap().count })
            })
            .collect();

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort_unstable();

        assert_eq!(counts, (1..=50).collect::<Vec<u64>>());
    }
}
