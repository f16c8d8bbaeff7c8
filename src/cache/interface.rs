//! Shared contract of the memoizing cache and its null stand-in.

use std::convert::Infallible;
use std::future::Future;

use async_trait::async_trait;

use crate::cache::{Cache, NullCache, Selector};

// == Memo Cache Trait ==
/// Key-addressed memoization.
///
/// Code written against this trait can be handed a [`Cache`] in production
/// and a [`NullCache`] wherever caching must be observably absent.
#[async_trait]
pub trait MemoCache<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Returns the stored value for `key`, or `None`. Never blocks.
    fn peek(&self, key: &str) -> Option<V>;

    /// Returns the value for `key`, running `init` to produce it if needed.
    ///
    /// # Errors
    /// Returns the producer's error unchanged.
    async fn try_get_with<F, Fut, E>(
        &self,
        key: &str,
        ttl_secs: Option<u64>,
        init: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send,
        E: Send;

    /// Infallible form of [`MemoCache::try_get_with`].
    async fn get_with<F, Fut>(&self, key: &str, ttl_secs: Option<u64>, init: F) -> V
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = V> + Send,
    {
        let result = self
            .try_get_with(key, ttl_secs, move || async move {
                Ok::<V, Infallible>(init().await)
            })
            .await;

        match result {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Removes the selected entries.
    fn clear(&self, selector: Selector);
}

#[async_trait]
impl<V> MemoCache<V> for Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn peek(&self, key: &str) -> Option<V> {
        Cache::peek(self, key)
    }

    async fn try_get_with<F, Fut, E>(
        &self,
        key: &str,
        ttl_secs: Option<u64>,
        init: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send,
        E: Send,
    {
        Cache::try_get_with(self, key, ttl_secs, init).await
    }

    fn clear(&self, selector: Selector) {
        Cache::clear(self, selector)
    }
}

#[async_trait]
impl<V> MemoCache<V> for NullCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn peek(&self, key: &str) -> Option<V> {
        NullCache::peek(self, key)
    }

    async fn try_get_with<F, Fut, E>(
        &self,
        key: &str,
        ttl_secs: Option<u64>,
        init: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send,
        E: Send,
    {
        NullCache::try_get_with(self, key, ttl_secs, init).await
    }

    fn clear(&self, selector: Selector) {
        NullCache::clear(self, selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn load_twice<C: MemoCache<u32>>(cache: &C, counter: &AtomicU32) -> (u32, u32) {
        let first = cache
            .get_with("k", None, || async { counter.fetch_add(1, Ordering::SeqCst) + 1 })
            .await;
        let second = cache
            .get_with("k", None, || async { counter.fetch_add(1, Ordering::SeqCst) + 1 })
            .await;
        (first, second)
    }

    #[tokio::test]
    async fn test_engine_through_trait() {
        let cache: Cache<u32> = Cache::new(Config::default());
        let counter = AtomicU32::new(0);

        assert_eq!(load_twice(&cache, &counter).await, (1, 1));
        assert_eq!(MemoCache::peek(&cache, "k"), Some(1));

        MemoCache::clear(&cache, Selector::All);
        assert_eq!(MemoCache::peek(&cache, "k"), None);
    }

    #[tokio::test]
    async fn test_null_cache_through_trait() {
        let cache: NullCache<u32> = NullCache::new();
        let counter = AtomicU32::new(0);

        assert_eq!(load_twice(&cache, &counter).await, (1, 2));
        assert_eq!(MemoCache::peek(&cache, "k"), None);
    }

    #[tokio::test]
    async fn test_trait_error_passthrough() {
        let cache: Cache<u32> = Cache::new(Config::default());
        let result: Result<u32, String> =
            MemoCache::try_get_with(&cache, "k", None, || async { Err("down".to_string()) }).await;
        assert_eq!(result, Err("down".to_string()));
    }
}
