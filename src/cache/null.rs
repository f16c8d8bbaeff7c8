//! Null Cache Module
//!
//! A cache that never caches: every lookup runs the producer.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::cache::Selector;
use crate::logging::{LogLevel, LogSink};

// == Null Cache ==
/// Drop-in stand-in for [`Cache`](crate::cache::Cache) that stores nothing.
///
/// Peeks are always absent and every `get_with`/`try_get_with` runs its
/// producer and hands back the result directly. No locking, no eviction,
/// no expiry.
pub struct NullCache<V> {
    sink: Option<Arc<dyn LogSink>>,
    _value: PhantomData<fn() -> V>,
}

impl<V> NullCache<V> {
    pub fn new() -> Self {
        Self {
            sink: None,
            _value: PhantomData,
        }
    }

    pub fn with_sink(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink: Some(sink),
            _value: PhantomData,
        }
    }

    fn log(&self, level: LogLevel, message: fmt::Arguments<'_>) {
        if let Some(sink) = &self.sink {
            sink.log(level, &message.to_string());
        }
    }

    pub fn peek(&self, _key: &str) -> Option<V> {
        None
    }

    pub async fn get_with<F, Fut>(&self, key: &str, _ttl_secs: Option<u64>, init: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        self.log(
            LogLevel::Debug,
            format_args!("Null cache: fresh value for '{}'", key),
        );
        init().await
    }

    pub async fn try_get_with<F, Fut, E>(
        &self,
        key: &str,
        _ttl_secs: Option<u64>,
        init: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.log(
            LogLevel::Debug,
            format_args!("Null cache: fresh value for '{}'", key),
        );
        init().await
    }

    pub fn clear(&self, _selector: impl Into<Selector>) {}

    pub fn len(&self) -> usize {
        0
    }

    pub fn is_empty(&self) -> bool {
        true
    }
}

impl<V> Default for NullCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for NullCache<V> {
    fn clone(&self) -> Self {
        Self {
            sink: self.sink.clone(),
            _value: PhantomData,
        }
    }
}

impl<V> fmt::Debug for NullCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NullCache")
            .field("logged", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemorySink;

    #[tokio::test]
    async fn test_always_returns_what_is_given() {
        let cache: NullCache<u32> = NullCache::new();

        assert_eq!(cache.get_with("one", None, || async { 1 }).await, 1);
        assert_eq!(cache.get_with("one", None, || async { 2 }).await, 2);
        assert_eq!(cache.peek("one"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let cache: NullCache<u32> = NullCache::new();

        let result: Result<u32, &str> = cache.try_get_with("k", Some(5), || async { Err("nope") }).await;
        assert_eq!(result, Err("nope"));
    }

    #[tokio::test]
    async fn test_logs_fresh_fetch() {
        let sink = Arc::new(MemorySink::new());
        let cache: NullCache<u32> = NullCache::with_sink(sink.clone());

        cache.get_with("k", None, || async { 1 }).await;
        cache.clear("k");

        assert!(sink.contains(LogLevel::Debug, "fresh value for 'k'"));
        assert_eq!(sink.events().len(), 1);
    }
}
