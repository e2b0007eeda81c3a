use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::ClientResult;

type SharedFetch<V> = Shared<BoxFuture<'static, ClientResult<V>>>;

struct CacheEntry<V> {
    data: V,
    cached_at: Instant,
}

/// Short-lived response cache keyed by request.
///
/// Successful results are served from memory until `ttl` elapses. Concurrent callers
/// asking for a key that is already being fetched await the same request instead of
/// issuing their own. Errors are handed to everyone waiting but never stored.
///
/// A fetch that overlaps an invalidation still answers its callers but is not stored.
pub struct RequestCache<V> {
    ttl: Duration,
    entries: DashMap<String, CacheEntry<V>>,
    in_flight: DashMap<String, SharedFetch<V>>,
    generation: AtomicU64,
}

impl<V> RequestCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn fresh(&self, key: &str) -> Option<V> {
        {
            let entry = self.entries.get(key)?;
            if entry.cached_at.elapsed() < self.ttl {
                return Some(entry.data.clone());
            }
        }
        self.entries
            .remove_if(key, |_, e| e.cached_at.elapsed() >= self.ttl);
        None
    }

    fn store(&self, key: &str, data: V, started: u64) {
        if self.generation.load(Ordering::SeqCst) != started {
            return;
        }

        let ttl = self.ttl;
        self.entries.retain(|_, e| e.cached_at.elapsed() < ttl);

        let cached_at = Instant::now();
        self.entries.insert(key.to_string(), CacheEntry { data, cached_at });

        // invalidate_prefix bumps the generation before clearing, so a bump seen
        // now means the clear may have run before our insert.
        if self.generation.load(Ordering::SeqCst) != started {
            self.entries.remove_if(key, |_, e| e.cached_at == cached_at);
        }
    }

    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> ClientResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClientResult<V>> + Send + 'static,
    {
        if let Some(data) = self.fresh(key) {
            tracing::trace!(key, "cache hit");
            return Ok(data);
        }

        let started = self.generation.load(Ordering::SeqCst);

        // A finished future left behind by a cancelled caller is treated as absent.
        let (shared, leader) = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(e) if e.get().peek().is_none() => (e.get().clone(), false),
            Entry::Occupied(mut e) => {
                let shared = fetch().boxed().shared();
                e.insert(shared.clone());
                (shared, true)
            }
            Entry::Vacant(e) => {
                let shared = fetch().boxed().shared();
                e.insert(shared.clone());
                (shared, true)
            }
        };

        if !leader {
            tracing::trace!(key, "joining in-flight request");
        }

        let result = shared.clone().await;

        if leader {
            if let Ok(data) = &result {
                self.store(key, data.clone(), started);
            }
            self.in_flight
                .remove_if(key, |_, current| current.ptr_eq(&shared));
        }

        result
    }

    /// Drop cached entries whose key starts with `prefix`. Requests already in flight for
    /// those keys are detached: their callers still get the answer, later callers refetch.
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.in_flight.retain(|key, _| !key.starts_with(prefix));
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.in_flight.clear();
        self.entries.clear();
    }

    /// Number of stored entries. Expired ones are dropped on lookup or at the next insert.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> std::fmt::Debug for RequestCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.len())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counting_fetch(
        calls: &Arc<AtomicUsize>,
        value: u32,
        delay: Duration,
    ) -> impl FnOnce() -> BoxFuture<'static, ClientResult<u32>> {
        let calls = calls.clone();
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_serves_fresh_entry_without_refetch() {
        let cache = RequestCache::new(Duration::from_secs(10));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_fetch("latest:EURUSD:2", counting_fetch(&calls, 1, Duration::ZERO))
            .await
            .unwrap();
        let second = cache
            .get_or_fetch("latest:EURUSD:2", counting_fetch(&calls, 2, Duration::ZERO))
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refetches_after_ttl() {
        let cache = RequestCache::new(Duration::from_millis(30));
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_fetch("k", counting_fetch(&calls, 1, Duration::ZERO))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let refreshed = cache
            .get_or_fetch("k", counting_fetch(&calls, 2, Duration::ZERO))
            .await
            .unwrap();

        assert_eq!(refreshed, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let cache = Arc::new(RequestCache::new(Duration::from_secs(10)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..8 {
            let cache = cache.clone();
            let fetch = counting_fetch(&calls, i, Duration::from_millis(50));
            handles.push(tokio::spawn(async move {
                cache.get_or_fetch("signals:BTCUSDT:50", fetch).await
            }));
        }

        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap().unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| *r == results[0]));
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: RequestCache<u32> = RequestCache::new(Duration::from_secs(10));

        let err = cache
            .get_or_fetch("k", || async {
                Err(ClientError::Http {
                    status: 500,
                    details: "boom".into(),
                })
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500: boom");
        assert!(cache.is_empty());

        let ok = cache.get_or_fetch("k", || async { Ok(7) }).await.unwrap();
        assert_eq!(ok, 7);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_prefix() {
        let cache = RequestCache::new(Duration::from_secs(10));
        cache.get_or_fetch("signals:EURUSD:50", || async { Ok(1) }).await.unwrap();
        cache.get_or_fetch("signals:EURUSD:10", || async { Ok(2) }).await.unwrap();
        cache.get_or_fetch("signals:GBPUSD:50", || async { Ok(3) }).await.unwrap();

        cache.invalidate_prefix("signals:EURUSD:");
        assert_eq!(cache.len(), 1);

        let refetched = cache
            .get_or_fetch("signals:EURUSD:50", || async { Ok(9) })
            .await
            .unwrap();
        assert_eq!(refetched, 9);
    }

    #[tokio::test]
    async fn test_invalidation_during_fetch_discards_result() {
        let cache = Arc::new(RequestCache::new(Duration::from_secs(10)));
        let calls = Arc::new(AtomicUsize::new(0));

        let pending = {
            let cache = cache.clone();
            let fetch = counting_fetch(&calls, 1, Duration::from_millis(50));
            tokio::spawn(async move { cache.get_or_fetch("signals:BTCUSDT:50", fetch).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.invalidate_prefix("signals:BTCUSDT:");

        // the detached request still answers the caller that started it
        assert_eq!(pending.await.unwrap().unwrap(), 1);
        assert!(cache.is_empty());

        let after = cache
            .get_or_fetch("signals:BTCUSDT:50", counting_fetch(&calls, 2, Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(after, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_caller_after_invalidation_does_not_join_old_fetch() {
        let cache = Arc::new(RequestCache::new(Duration::from_secs(10)));
        let calls = Arc::new(AtomicUsize::new(0));

        let pending = {
            let cache = cache.clone();
            let fetch = counting_fetch(&calls, 1, Duration::from_millis(80));
            tokio::spawn(async move { cache.get_or_fetch("latest:EURUSD:2", fetch).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.invalidate_prefix("latest:EURUSD:");

        let fresh = cache
            .get_or_fetch("latest:EURUSD:2", counting_fetch(&calls, 2, Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(fresh, 2);
        assert_eq!(pending.await.unwrap().unwrap(), 1);

        // the old fetch finishing late must not overwrite the newer entry
        let cached = cache
            .get_or_fetch("latest:EURUSD:2", counting_fetch(&calls, 3, Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(cached, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_swept() {
        let cache = RequestCache::new(Duration::from_millis(200));
        for i in 0..200u32 {
            let key = format!("range:EURUSD:{}", i);
            cache.get_or_fetch(&key, move || async move { Ok(i) }).await.unwrap();
        }
        assert_eq!(cache.len(), 200);

        tokio::time::sleep(Duration::from_millis(250)).await;
        cache.get_or_fetch("range:EURUSD:new", || async { Ok(0) }).await.unwrap();
        assert_eq!(cache.len(), 1);

        tokio::time::sleep(Duration::from_millis(250)).await;
        let refreshed = cache.get_or_fetch("range:EURUSD:new", || async { Ok(1) }).await.unwrap();
        assert_eq!(refreshed, 1);
        assert_eq!(cache.len(), 1);
    }
}
