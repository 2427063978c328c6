//! Time-boxed memoization on top of [`CacheDb`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::Mutex;

use super::connection::CacheDb;
use super::hash::compute_memo_key;
use crate::Error;

/// A memoizing cache for one family of calls.
///
/// Entries live for `ttl` after they were computed; the shared store is
/// trimmed to `max_entries` by least-recent use after every insert. Misses
/// are computed one at a time, so callers arriving while a value is being
/// produced wait for it instead of starting their own computation.
#[derive(Clone, Debug)]
pub struct MemoCache {
    db: CacheDb,
    namespace: String,
    ttl: Duration,
    max_entries: usize,
    compute: Arc<Mutex<()>>,
}

impl MemoCache {
    pub fn new(db: CacheDb, namespace: impl Into<String>, ttl: Duration, max_entries: usize) -> Result<Self, Error> {
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(Error::InvalidInput("memo namespace must not be empty".into()));
        }
        Ok(Self { db, namespace, ttl, max_entries, compute: Arc::new(Mutex::new(())) })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cache key for a call with the given argument string.
    pub fn key(&self, args: &str) -> String {
        compute_memo_key(&self.namespace, args)
    }

    /// Fresh cached value for `args`, if any.
    pub async fn lookup<T: DeserializeOwned>(&self, args: &str) -> Result<Option<T>, Error> {
        match self.db.get_memo(&self.key(args)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Store `value` for `args` and enforce the entry bound.
    pub async fn store<T: Serialize>(&self, args: &str, value: &T) -> Result<(), Error> {
        let json = serde_json::to_string(value)?;
        self.db.put_memo(&self.key(args), &self.namespace, &json, self.ttl).await?;

        let evicted = self.db.purge_lru_memo(self.max_entries).await?;
        if evicted > 0 {
            tracing::debug!(namespace = %self.namespace, evicted, "evicted least recently used memo entries");
        }
        Ok(())
    }

    /// Return the cached value for `args`, or run `producer` and cache its result.
    ///
    /// A producer error is returned as-is and nothing is stored.
    pub async fn memoize<T, E, F, Fut>(&self, args: &str, producer: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<Error>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.memoize_if(args, producer, |_| true).await
    }

    /// Like [`memoize`](Self::memoize), but a produced value is stored only
    /// when `keep` accepts it. Rejected values are returned to this caller
    /// and the next caller computes again.
    pub async fn memoize_if<T, E, F, Fut, K>(&self, args: &str, producer: F, keep: K) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<Error>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        K: FnOnce(&T) -> bool,
    {
        if let Some(value) = self.lookup(args).await? {
            tracing::debug!(namespace = %self.namespace, "memo hit");
            return Ok(value);
        }

        let _guard = self.compute.lock().await;

        // another caller may have filled the entry while we waited
        if let Some(value) = self.lookup(args).await? {
            tracing::debug!(namespace = %self.namespace, "memo hit after wait");
            return Ok(value);
        }

        tracing::info!(namespace = %self.namespace, ttl_secs = self.ttl.as_secs(), "memo miss, computing");
        let value = producer().await?;
        if keep(&value) {
            self.store(args, &value).await?;
        } else {
            tracing::debug!(namespace = %self.namespace, "memo value rejected, not stored");
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HOUR: Duration = Duration::from_secs(3600);

    async fn cache(ttl: Duration, max_entries: usize) -> MemoCache {
        let db = CacheDb::open_in_memory().await.unwrap();
        MemoCache::new(db, "test", ttl, max_entries).unwrap()
    }

    #[tokio::test]
    async fn test_empty_namespace_rejected() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = MemoCache::new(db, "", HOUR, 10);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_memoize_within_ttl_calls_producer_once() {
        let cache = cache(HOUR, 10).await;
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Vec<u32> = cache
                .memoize("", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Error>(vec![1, 2, 3])
                })
                .await
                .unwrap();
            assert_eq!(value, vec![1, 2, 3]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_memoize_after_expiry_recomputes() {
        let cache = cache(Duration::ZERO, 10).await;
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let _: u32 = cache
                .memoize("", || async { Ok::<_, Error>(calls.fetch_add(1, Ordering::SeqCst) as u32) })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_memoize_distinguishes_args() {
        let cache = cache(HOUR, 10).await;
        let a: String = cache.memoize("a", || async { Ok::<_, Error>("A".to_string()) }).await.unwrap();
        let b: String = cache.memoize("b", || async { Ok::<_, Error>("B".to_string()) }).await.unwrap();
        assert_eq!(a, "A");
        assert_eq!(b, "B");
    }

    #[tokio::test]
    async fn test_producer_error_is_not_cached() {
        let cache = cache(HOUR, 10).await;

        let failed: Result<u32, Error> =
            cache.memoize("", || async { Err(Error::HttpError("status 500".into())) }).await;
        assert!(matches!(failed, Err(Error::HttpError(_))));

        let value: u32 = cache.memoize("", || async { Ok::<_, Error>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_computation() {
        let cache = cache(HOUR, 10).await;
        let calls = Arc::new(AtomicUsize::new(0));

        let run = |cache: MemoCache, calls: Arc<AtomicUsize>| async move {
            cache
                .memoize("", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, Error>(42u32)
                })
                .await
        };

        let (a, b) = tokio::join!(run(cache.clone(), calls.clone()), run(cache.clone(), calls.clone()));
        assert_eq!(a.unwrap(), 42);
        assert_eq!(b.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_memoize_if_skips_rejected_values() {
        let cache = cache(HOUR, 10).await;
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value: Option<u32> = cache
                .memoize_if(
                    "",
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, Error>(None)
                    },
                    Option::is_some,
                )
                .await
                .unwrap();
            assert_eq!(value, None);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.db.count_memo().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_memoize_if_concurrent_callers_share_kept_value() {
        let cache = cache(HOUR, 10).await;
        let calls = Arc::new(AtomicUsize::new(0));

        let run = |cache: MemoCache, calls: Arc<AtomicUsize>| async move {
            cache
                .memoize_if(
                    "",
                    || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, Error>(Some(9u32))
                    },
                    Option::is_some,
                )
                .await
        };

        let (a, b) = tokio::join!(run(cache.clone(), calls.clone()), run(cache.clone(), calls.clone()));
        assert_eq!(a.unwrap(), Some(9));
        assert_eq!(b.unwrap(), Some(9));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_store_enforces_entry_bound() {
        let cache = cache(HOUR, 2).await;
        for arg in ["a", "b", "c"] {
            cache.store(arg, &arg).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        assert!(cache.lookup::<String>("a").await.unwrap().is_none());
        assert_eq!(cache.lookup::<String>("c").await.unwrap().as_deref(), Some("c"));
    }
}
