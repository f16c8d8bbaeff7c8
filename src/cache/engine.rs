//! Cache Engine Module
//!
//! Memoizing cache combining a HashMap entry table with a per-key population
//! lock set, scheduled TTL expiry and least-recently-accessed eviction.
//!
//! A caller asking for a key either gets the stored value, waits for the
//! in-flight population of that key and re-checks, or becomes the single
//! populator: it runs the producer, commits the value and wakes the waiters.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::cache::{CacheEntry, CacheStats, Selector};
use crate::config::Config;
use crate::logging::{LogLevel, LogSink};
use crate::tasks::spawn_expiry_task;

// == Shared State ==
struct Shared<V> {
    config: Config,
    state: Mutex<State<V>>,
}

struct State<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Keys with a running producer. Waiters clone the receiver; the populator
    /// owns the sender and closes it on release.
    populating: HashMap<String, watch::Receiver<()>>,
    stats: CacheStats,
    next_generation: u64,
    access_clock: u64,
}

impl<V> State<V> {
    fn tick(&mut self) -> u64 {
        self.access_clock += 1;
        self.access_clock
    }

    // == Evict Oldest ==
    /// Removes the least recently accessed entry if the table is over
    /// capacity. At most one entry goes per call.
    fn evict_oldest(&mut self, max_entries: usize) -> Option<(String, CacheEntry<V>)> {
        if self.entries.len() <= max_entries {
            return None;
        }

        // access_seq is unique per entry, so the minimum is never a tie
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.access_seq)
            .map(|(key, _)| key.clone())?;

        let evicted = self.entries.remove_entry(&victim)?;
        self.stats.record_eviction();
        self.stats.set_total_entries(self.entries.len());
        Some(evicted)
    }
}

impl<V> Shared<V> {
    /// Removes `key` only if it still holds the population `generation`.
    fn expire(&self, key: &str, generation: u64) -> Option<CacheEntry<V>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        match state.entries.get(key) {
            Some(entry) if entry.generation == generation => {
                let entry = state.entries.remove(key)?;
                state.stats.record_expiration();
                state.stats.set_total_entries(state.entries.len());
                Some(entry)
            }
            _ => None,
        }
    }
}

fn emit(sink: Option<&Arc<dyn LogSink>>, level: LogLevel, message: fmt::Arguments<'_>) {
    if let Some(sink) = sink {
        sink.log(level, &message.to_string());
    }
}

// == Cache ==
/// Process-local memoizing cache.
///
/// Cloning is cheap and every clone shares the same table and lock set.
pub struct Cache<V> {
    shared: Arc<Shared<V>>,
    sink: Option<Arc<dyn LogSink>>,
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<V> fmt::Debug for Cache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("config", &self.shared.config)
            .field("logged", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

enum Acquire<'a, V> {
    Hit(V),
    Wait(watch::Receiver<()>),
    Populate(PopulationGuard<'a, V>),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Pending,
    Committed,
    Failed,
}

// == Population Guard ==
/// Held by the sole populator of a key. Dropping it releases the key and
/// wakes the waiters, whether the producer committed, returned an error,
/// panicked, or the populating future was dropped.
struct PopulationGuard<'a, V> {
    cache: &'a Cache<V>,
    key: &'a str,
    outcome: Outcome,
    _release: watch::Sender<()>,
}

impl<V> Drop for PopulationGuard<'_, V> {
    fn drop(&mut self) {
        {
            let mut state = self.cache.shared.state.lock();
            state.populating.remove(self.key);
            if self.outcome != Outcome::Committed {
                state.stats.record_failure();
            }
        }

        let sink = self.cache.sink.as_ref();
        if self.outcome == Outcome::Pending {
            emit(
                sink,
                LogLevel::Warning,
                format_args!("Population of '{}' abandoned before completing", self.key),
            );
        }
        emit(
            sink,
            LogLevel::Debug,
            format_args!("Released population lock for '{}'", self.key),
        );
        // _release drops after this body, once the key is out of the lock set
    }
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a silent cache.
    pub fn new(config: Config) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    populating: HashMap::new(),
                    stats: CacheStats::new(),
                    next_generation: 0,
                    access_clock: 0,
                }),
            }),
            sink: None,
        }
    }

    /// Creates a cache that reports its events to `sink`.
    pub fn with_sink(config: Config, sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::new(config)
        }
    }

    /// Returns a handle on the same cache that reports to `sink` instead.
    pub fn logged(&self, sink: Arc<dyn LogSink>) -> Self {
        Self {
            shared: self.shared.clone(),
            sink: Some(sink),
        }
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    fn log(&self, level: LogLevel, message: fmt::Arguments<'_>) {
        emit(self.sink.as_ref(), level, message);
    }

    // == Peek ==
    /// Returns the stored value for `key` without blocking.
    ///
    /// Never waits for an in-flight population and never refreshes the
    /// entry's access time.
    pub fn peek(&self, key: &str) -> Option<V> {
        let value = {
            let mut state = self.shared.state.lock();
            let value = state.entries.get(key).map(|entry| entry.value.clone());
            match value {
                Some(_) => state.stats.record_hit(),
                None => state.stats.record_miss(),
            }
            value
        };

        let found = if value.is_some() { "hit" } else { "absent" };
        self.log(
            LogLevel::Debug,
            format_args!("Peek for cache key '{}': {}", key, found),
        );
        value
    }

    // == Get With ==
    /// Returns the value for `key`, populating it with `init` if absent.
    ///
    /// Like [`Cache::try_get_with`] for producers that cannot fail.
    pub async fn get_with<F, Fut>(&self, key: &str, ttl_secs: Option<u64>, init: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
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

    // == Try Get With ==
    /// Returns the value for `key`, populating it with `init` if absent.
    ///
    /// At most one producer runs per key at a time. Callers arriving while a
    /// population is in flight wait for it to finish and then re-check: they
    /// get the committed value, or, if the producer failed, one of them
    /// becomes the next populator. `init` runs at most once per call.
    ///
    /// `ttl_secs` overrides the configured default TTL; `Some(0)` means the
    /// entry never expires.
    ///
    /// # Errors
    /// Returns the producer's error unchanged. Errors are never cached.
    pub async fn try_get_with<F, Fut, E>(
        &self,
        key: &str,
        ttl_secs: Option<u64>,
        init: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let mut guard = loop {
            match self.acquire(key) {
                Acquire::Hit(value) => {
                    self.log(
                        LogLevel::Debug,
                        format_args!("Using cached value for '{}'", key),
                    );
                    return Ok(value);
                }
                Acquire::Wait(mut released) => {
                    self.log(
                        LogLevel::Debug,
                        format_args!("Cache locked for '{}'. Waiting.", key),
                    );
                    // Err means the populator dropped its sender: the lock is gone
                    let _ = released.changed().await;
                    self.log(
                        LogLevel::Debug,
                        format_args!("Cache released for '{}'. Re-checking.", key),
                    );
                }
                Acquire::Populate(guard) => break guard,
            }
        };

        self.log(
            LogLevel::Info,
            format_args!("Cache not set for '{}'. Populating.", key),
        );

        match init().await {
            Ok(value) => Ok(self.commit(&mut guard, value, ttl_secs)),
            Err(err) => {
                guard.outcome = Outcome::Failed;
                self.log(
                    LogLevel::Info,
                    format_args!("Producer for '{}' failed. Nothing cached.", key),
                );
                Err(err)
            }
        }
    }

    fn acquire<'a>(&'a self, key: &'a str) -> Acquire<'a, V> {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;

        if let Some(released) = state.populating.get(key) {
            return Acquire::Wait(released.clone());
        }

        let seq = state.tick();
        if let Some(entry) = state.entries.get_mut(key) {
            entry.touch(seq);
            state.stats.record_hit();
            return Acquire::Hit(entry.value.clone());
        }

        state.stats.record_miss();
        let (release, released) = watch::channel(());
        state.populating.insert(key.to_string(), released);

        Acquire::Populate(PopulationGuard {
            cache: self,
            key,
            outcome: Outcome::Pending,
            _release: release,
        })
    }

    // == Commit ==
    /// Stores a produced value, schedules its expiry and runs the capacity
    /// check. The population lock is released when `guard` drops.
    fn commit(&self, guard: &mut PopulationGuard<'_, V>, value: V, ttl_secs: Option<u64>) -> V {
        let key = guard.key;
        let ttl = ttl_secs.unwrap_or(self.shared.config.default_ttl);

        let (evicted, len) = {
            let mut lock = self.shared.state.lock();
            let state = &mut *lock;

            let generation = state.next_generation;
            state.next_generation += 1;
            let seq = state.tick();

            let mut entry = CacheEntry::new(value.clone(), generation, seq);
            if ttl > 0 {
                entry.set_expiry(self.schedule_expiry(key, generation, ttl));
            }
            state.entries.insert(key.to_string(), entry);
            state.stats.record_population();
            state.stats.set_total_entries(state.entries.len());

            let len = state.entries.len();
            (state.evict_oldest(self.shared.config.max_entries), len)
        };
        guard.outcome = Outcome::Committed;

        if ttl > 0 {
            self.log(
                LogLevel::Info,
                format_args!("Cached value for '{}' (expires in {}s)", key, ttl),
            );
        } else {
            self.log(LogLevel::Info, format_args!("Cached value for '{}'", key));
        }

        if let Some((evicted_key, entry)) = evicted {
            self.log(
                LogLevel::Notice,
                format_args!(
                    "Cache holds {} entries (max {}). Grooming.",
                    len, self.shared.config.max_entries
                ),
            );
            self.log(
                LogLevel::Info,
                format_args!(
                    "Evicted '{}', last used at {}",
                    evicted_key,
                    entry.last_access.to_rfc3339()
                ),
            );
        }

        value
    }

    fn schedule_expiry(&self, key: &str, generation: u64, ttl: u64) -> tokio::task::JoinHandle<()> {
        let shared: Weak<Shared<V>> = Arc::downgrade(&self.shared);
        let sink = self.sink.clone();
        let key = key.to_string();

        spawn_expiry_task(ttl, move || {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            if let Some(expired) = shared.expire(&key, generation) {
                emit(
                    sink.as_ref(),
                    LogLevel::Info,
                    format_args!("Entry '{}' expired after {}s", key, ttl),
                );
                // Aborts this task's own handle; nothing is awaited after it
                drop(expired);
            }
        })
    }

    // == Clear ==
    /// Removes the selected entries and cancels their expiry.
    ///
    /// Accepts a key (`&str`/`String`), a `regex::Regex`, a [`Selector`], or
    /// `Option` of any of these where `None` clears everything. A missing key
    /// is a no-op. In-flight populations are left alone and will still commit.
    pub fn clear(&self, selector: impl Into<Selector>) {
        let selector = selector.into();

        let removed: Vec<(String, CacheEntry<V>)> = {
            let mut lock = self.shared.state.lock();
            let state = &mut *lock;

            let removed = match &selector {
                Selector::All => state.entries.drain().collect(),
                Selector::Key(key) => state.entries.remove_entry(key).into_iter().collect(),
                Selector::Pattern(_) => {
                    let matched: Vec<String> = state
                        .entries
                        .keys()
                        .filter(|key| selector.matches(key))
                        .cloned()
                        .collect();
                    matched
                        .iter()
                        .filter_map(|key| state.entries.remove_entry(key))
                        .collect()
                }
            };
            state.stats.set_total_entries(state.entries.len());
            removed
        };

        match &selector {
            Selector::All => {
                self.log(LogLevel::Notice, format_args!("Clearing all cache keys"));
            }
            Selector::Key(key) => {
                self.log(LogLevel::Notice, format_args!("Clearing cache key {}", key));
                if removed.is_empty() {
                    self.log(
                        LogLevel::Info,
                        format_args!("Key '{}' not in cache. Nothing deleted.", key),
                    );
                } else {
                    self.log(
                        LogLevel::Info,
                        format_args!("Key '{}' found. Deleted value.", key),
                    );
                }
            }
            Selector::Pattern(_) => {
                self.log(
                    LogLevel::Notice,
                    format_args!("Clearing cache keys matching {}", selector),
                );
                for (key, _) in &removed {
                    self.log(
                        LogLevel::Debug,
                        format_args!("Key matched: {}. Deleted value.", key),
                    );
                }
            }
        }
    }

    // == Introspection ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `key` has a stored entry. Does not count as an access.
    pub fn contains_key(&self, key: &str) -> bool {
        self.shared.state.lock().entries.contains_key(key)
    }

    /// Returns true if a producer for `key` is currently running.
    pub fn is_populating(&self, key: &str) -> bool {
        self.shared.state.lock().populating.contains_key(key)
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.shared.state.lock();
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.entries.len());
        stats
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemorySink;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn cache(max_entries: usize, default_ttl: u64) -> Cache<u32> {
        Cache::new(Config::new(max_entries, default_ttl))
    }

    #[tokio::test]
    async fn test_peek_never_populated() {
        let cache = cache(10, 0);
        assert_eq!(cache.peek("missing"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_populate_then_hit() {
        let cache = cache(10, 0);
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_with("k", None, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                1
            })
            .await;
        let second = cache
            .get_with("k", None, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                2
            })
            .await;

        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.peek("k"), Some(1));

        let stats = cache.stats();
        assert_eq!(stats.populations, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache = cache(10, 0);

        let result: Result<u32, &str> = cache.try_get_with("k", None, || async { Err("boom") }).await;
        assert_eq!(result, Err("boom"));
        assert!(!cache.contains_key("k"));
        assert!(!cache.is_populating("k"));

        let result: Result<u32, &str> = cache.try_get_with("k", None, || async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
        assert_eq!(cache.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_eviction_prefers_least_recently_accessed() {
        let cache = cache(2, 0);

        cache.get_with("a", None, || async { 1 }).await;
        cache.get_with("b", None, || async { 2 }).await;
        // Refresh a
        cache.get_with("a", None, || async { 100 }).await;
        cache.get_with("c", None, || async { 3 }).await;

        assert_eq!(cache.len(), 2);
        assert!(cache.contains_key("a"));
        assert!(!cache.contains_key("b"));
        assert!(cache.contains_key("c"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_peek_does_not_refresh_access() {
        let cache = cache(2, 0);

        cache.get_with("a", None, || async { 1 }).await;
        cache.get_with("b", None, || async { 2 }).await;
        assert_eq!(cache.peek("a"), Some(1));
        cache.get_with("c", None, || async { 3 }).await;

        assert!(!cache.contains_key("a"));
        assert!(cache.contains_key("b"));
    }

    #[tokio::test]
    async fn test_zero_capacity_keeps_nothing() {
        let cache = cache(0, 0);

        let value = cache.get_with("k", None, || async { 5 }).await;

        assert_eq!(value, 5);
        assert!(cache.is_empty());
        assert_eq!(cache.peek("k"), None);
    }

    #[tokio::test]
    async fn test_stale_expiry_does_not_remove_repopulated_entry() {
        let cache = cache(10, 0);

        cache.get_with("k", Some(1), || async { 1 }).await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        cache.clear("k");
        cache.get_with("k", Some(2), || async { 2 }).await;

        // First timer would have fired here
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(cache.peek("k"), Some(2));

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert_eq!(cache.peek("k"), None);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test]
    async fn test_explicit_zero_ttl_overrides_default() {
        let cache = cache(10, 1);

        cache.get_with("forever", Some(0), || async { 1 }).await;
        cache.get_with("default", None, || async { 2 }).await;
        tokio::time::sleep(Duration::from_millis(1200)).await;

        assert_eq!(cache.peek("forever"), Some(1));
        assert_eq!(cache.peek("default"), None);
    }

    fn explode() -> u32 {
        panic!("producer panicked")
    }

    #[tokio::test]
    async fn test_panicking_producer_releases_lock() {
        let cache = cache(10, 0);
        let handle = cache.clone();

        let joined = tokio::spawn(async move {
            handle
                .get_with("k", None, || async { explode() })
                .await
        })
        .await;

        assert!(joined.is_err());
        assert!(!cache.is_populating("k"));
        assert_eq!(cache.get_with("k", None, || async { 9 }).await, 9);
    }

    #[tokio::test]
    async fn test_cancelled_populator_releases_lock() {
        let cache = cache(10, 0);

        let slow = cache.get_with("k", None, || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            1
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(50), slow).await;

        assert!(timed_out.is_err());
        assert!(!cache.is_populating("k"));
        assert_eq!(cache.get_with("k", None, || async { 2 }).await, 2);
    }

    #[tokio::test]
    async fn test_logged_handle_shares_state() {
        let cache = cache(10, 0);
        let sink = Arc::new(MemorySink::new());
        let logged = cache.logged(sink.clone());

        logged.get_with("k", None, || async { 1 }).await;
        logged.clear("missing");

        assert_eq!(cache.peek("k"), Some(1));
        assert!(sink.contains(LogLevel::Info, "Cache not set for 'k'"));
        assert!(sink.contains(LogLevel::Debug, "Released population lock for 'k'"));
        assert!(sink.contains(LogLevel::Notice, "Clearing cache key missing"));
        assert!(sink.contains(LogLevel::Info, "not in cache"));
    }

    #[tokio::test]
    async fn test_eviction_is_logged() {
        let sink = Arc::new(MemorySink::new());
        let cache: Cache<u32> = Cache::with_sink(Config::new(1, 0), sink.clone());

        cache.get_with("a", None, || async { 1 }).await;
        cache.get_with("b", None, || async { 2 }).await;

        assert!(sink.contains(LogLevel::Notice, "Grooming"));
        assert!(sink.contains(LogLevel::Info, "Evicted 'a'"));
    }
}
