//! Configuration Module
//!
//! Construction-time settings for a cache instance. Immutable once the cache
//! is built.

use std::env;

use serde::Deserialize;

/// Cache configuration parameters.
///
/// Values can be loaded from environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capacity bound; 0 keeps nothing past the eviction check
    pub max_entries: usize,
    /// Default TTL in seconds for populations without an override, 0 = never expire
    pub default_ttl: u64,
}

impl Config {
    /// Creates a new Config with explicit values.
    pub fn new(max_entries: usize, default_ttl: u64) -> Self {
        Self {
            max_entries,
            default_ttl,
        }
    }

    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Capacity bound (default: 1000)
    /// - `DEFAULT_TTL` - Default TTL in seconds, 0 disables expiry (default: 0)
    ///
    /// Missing or unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: env::var("MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_entries),
            default_ttl: env::var("DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: 0,
        }
    }
}
