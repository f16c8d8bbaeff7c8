//! Cache Module
//!
//! Memoizing cache with single-flight population, TTL expiry and
//! least-recently-accessed eviction, plus a null variant that never stores.

mod engine;
mod entry;
mod interface;
mod null;
mod selector;
mod stats;


// Re-export public types
pub use engine::Cache;
pub use entry::CacheEntry;
pub use interface::MemoCache;
pub use null::NullCache;
pub use selector::Selector;
pub use stats::CacheStats;
