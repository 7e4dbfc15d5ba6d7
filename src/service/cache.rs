use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::config::CacheConfig;
use crate::source::FetchResult;

/// Cache key: one entry per (video, requested language) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub video_id: String,
    pub language: String,
}

impl CacheKey {
    pub fn new(video_id: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            language: language.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheSlot {
    result: FetchResult,
    stored_at: Instant,
    seq: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<CacheKey, CacheSlot>,
    /// Insertion order, oldest first; evicted in this order under
    /// capacity pressure.
    order: BTreeMap<u64, CacheKey>,
    next_seq: u64,
}

/// Time-boxed, size-bounded store of successful fetch results.
pub struct ResultCache {
    ttl: Duration,
    max_entries: usize,
    inner: Mutex<CacheInner>,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            ttl: Duration::from_secs(config.ttl_secs),
            max_entries: config.max_entries,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Return the stored result for `key` if it is still within TTL.
    /// Expired entries are dropped on the way out.
    pub async fn get(&self, key: &CacheKey) -> Option<FetchResult> {
        let mut inner = self.inner.lock().await;
        let expired_seq = match inner.entries.get(key) {
            Some(slot) if slot.stored_at.elapsed() <= self.ttl => {
                tracing::debug!("cache hit for {}/{}", key.video_id, key.language);
                return Some(slot.result.clone());
            }
            Some(slot) => slot.seq,
            None => return None,
        };
        inner.entries.remove(key);
        inner.order.remove(&expired_seq);
        None
    }

    /// Store a result. Only `Success` results are kept; everything else is
    /// ignored so failures are always re-fetched.
    pub async fn put(&self, key: CacheKey, result: &FetchResult) {
        if !result.is_success() {
            return;
        }
        let mut inner = self.inner.lock().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;

        if let Some(previous) = inner.entries.insert(
            key.clone(),
            CacheSlot {
                result: result.clone(),
                stored_at: Instant::now(),
                seq,
            },
        ) {
            inner.order.remove(&previous.seq);
        }
        inner.order.insert(seq, key);

        Self::prune_locked(&mut inner, self.ttl, self.max_entries);
    }

    /// Drop TTL-expired entries, then the oldest-inserted entries until the
    /// count is back at the cap.
    pub async fn prune(&self) {
        let mut inner = self.inner.lock().await;
        Self::prune_locked(&mut inner, self.ttl, self.max_entries);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn prune_locked(inner: &mut CacheInner, ttl: Duration, max_entries: usize) {
        let expired: Vec<(u64, CacheKey)> = inner
            .order
            .iter()
            .filter(|(_, key)| {
                inner
                    .entries
                    .get(key)
                    .is_some_and(|slot| slot.stored_at.elapsed() > ttl)
            })
            .map(|(seq, key)| (*seq, key.clone()))
            .collect();
        for (seq, key) in expired {
            inner.entries.remove(&key);
            inner.order.remove(&seq);
        }

        while inner.entries.len() > max_entries {
            let Some((&seq, _)) = inner.order.iter().next() else {
                break;
            };
            if let Some(key) = inner.order.remove(&seq) {
                tracing::debug!("evicting oldest cache entry {}/{}", key.video_id, key.language);
                inner.entries.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::source::{FetchResult, TranscriptEntry};

    fn cache(ttl_secs: u64, max_entries: usize) -> ResultCache {
        ResultCache::new(CacheConfig {
            ttl_secs,
            max_entries,
        })
    }

    fn success(video_id: &str) -> FetchResult {
        FetchResult::success(
            video_id,
            "English",
            "en",
            vec![TranscriptEntry {
                text: "hello".into(),
                start: 0.0,
                duration: 2.0,
            }],
        )
    }

    #[tokio::test(start_paused = true)]
    async fn put_then_get_within_ttl() {
        let cache = cache(300, 10);
        let key = CacheKey::new("vid", "en");
        let result = success("vid");
        cache.put(key.clone(), &result).await;

        let hit = cache.get(&key).await.expect("entry should be live");
        assert_eq!(hit.video_id, result.video_id);
        assert_eq!(hit.entries, result.entries);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_dropped_lazily() {
        let cache = cache(300, 10);
        let key = CacheKey::new("vid", "en");
        cache.put(key.clone(), &success("vid")).await;

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert!(cache.get(&key).await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn only_success_results_are_cached() {
        let cache = cache(300, 10);
        let key = CacheKey::new("vid", "en");
        cache
            .put(key.clone(), &FetchResult::error("vid", "timeout after 10s"))
            .await;
        cache
            .put(key.clone(), &FetchResult::no_transcript("vid", "nothing"))
            .await;
        assert!(cache.get(&key).await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn capacity_evicts_oldest_inserted_first() {
        let cache = cache(300, 5);
        for i in 0..10 {
            let id = format!("vid{}", i);
            cache.put(CacheKey::new(&id, "en"), &success(&id)).await;
        }
        assert_eq!(cache.len().await, 5);

        // The five oldest are gone, the five newest remain
        for i in 0..5 {
            let key = CacheKey::new(format!("vid{}", i), "en");
            assert!(cache.get(&key).await.is_none(), "vid{} should be evicted", i);
        }
        for i in 5..10 {
            let key = CacheKey::new(format!("vid{}", i), "en");
            assert!(cache.get(&key).await.is_some(), "vid{} should remain", i);
        }
    }

    #[tokio::test]
    async fn reinsert_refreshes_insertion_order() {
        let cache = cache(300, 2);
        cache.put(CacheKey::new("a", "en"), &success("a")).await;
        cache.put(CacheKey::new("b", "en"), &success("b")).await;
        // Re-inserting "a" makes "b" the oldest
        cache.put(CacheKey::new("a", "en"), &success("a")).await;
        cache.put(CacheKey::new("c", "en"), &success("c")).await;

        assert!(cache.get(&CacheKey::new("b", "en")).await.is_none());
        assert!(cache.get(&CacheKey::new("a", "en")).await.is_some());
        assert!(cache.get(&CacheKey::new("c", "en")).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn prune_removes_expired_before_applying_cap() {
        let cache = cache(100, 3);
        cache.put(CacheKey::new("old", "en"), &success("old")).await;
        tokio::time::sleep(Duration::from_secs(101)).await;
        cache.put(CacheKey::new("new1", "en"), &success("new1")).await;
        cache.put(CacheKey::new("new2", "en"), &success("new2")).await;
        cache.put(CacheKey::new("new3", "en"), &success("new3")).await;

        // The expired entry was pruned, so the cap never bit
        assert_eq!(cache.len().await, 3);
        assert!(cache.get(&CacheKey::new("new1", "en")).await.is_some());
    }

    #[tokio::test]
    async fn default_config_matches_documented_bounds() {
        let defaults = Config::default().cache;
        assert_eq!(defaults.ttl_secs, 300);
        assert_eq!(defaults.max_entries, 1000);
    }
}
