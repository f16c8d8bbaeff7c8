//! Logging Module
//!
//! The cache reports every state transition (lock acquired/released, hit,
//! miss, eviction, expiry, invalidation) to an injected [`LogSink`]. A cache
//! without a sink stays silent.

use std::fmt;

use tracing::{debug, info, warn};

// == Log Level ==
/// Severity of a cache event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
        };
        f.write_str(name)
    }
}

// == Log Sink ==
/// Receiver for cache events.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

// == Tracing Sink ==
/// Forwards cache events to `tracing`.
///
/// `tracing` has no notice level; notices are emitted at info with a
/// `notice = true` field so subscribers can still tell them apart.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!(target: "memo_cache", "{}", message),
            LogLevel::Info => info!(target: "memo_cache", "{}", message),
            LogLevel::Notice => info!(target: "memo_cache", notice = true, "{}", message),
            LogLevel::Warning => warn!(target: "memo_cache", "{}", message),
        }
    }
}

// == Memory Sink ==
/// Records events in memory. Handy for asserting on what a cache reported.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: parking_lot::Mutex<Vec<(LogLevel, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every event recorded so far.
    pub fn events(&self) -> Vec<(LogLevel, String)> {
        self.events.lock().clone()
    }

    /// Returns true if any recorded message at `level` contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.events
            .lock()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, message: &str) {
        self.events.lock().push((level, message.to_string()));
    }
}
