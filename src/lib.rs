//! Memo Cache - A process-local memoizing cache
//!
//! Runs a value producer at most once per key even under concurrent callers,
//! with TTL expiration, LRU eviction and key/pattern invalidation.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod tasks;

pub use cache::{Cache, CacheStats, MemoCache, NullCache, Selector};
pub use config::Config;
pub use error::{CacheError, Result};
pub use logging::{LogLevel, LogSink, MemorySink, TracingSink};
