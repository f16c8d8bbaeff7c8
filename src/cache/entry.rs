//! Cache Entry Module
//!
//! Defines the stored record for a populated key.

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

// == Cache Entry ==
/// A populated value plus the metadata eviction and expiry need.
///
/// Dropping an entry cancels its scheduled expiry, so every removal path
/// (clear, eviction, expiry) releases the timer along with the value.
#[derive(Debug)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Identity of this population; stale expiry timers compare against it
    pub generation: u64,
    /// Logical access clock, strictly increasing across the whole table
    pub access_seq: u64,
    /// Wall-clock time of the last population or read hit
    pub last_access: DateTime<Utc>,
    /// Pending expiry, None = never expires
    expiry: Option<JoinHandle<()>>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry stamped as accessed now.
    pub fn new(value: V, generation: u64, access_seq: u64) -> Self {
        Self {
            value,
            generation,
            access_seq,
            last_access: Utc::now(),
            expiry: None,
        }
    }

    // == Touch ==
    /// Records a read hit.
    pub fn touch(&mut self, access_seq: u64) {
        self.access_seq = access_seq;
        self.last_access = Utc::now();
    }

    // == Expiry Handle ==
    /// Attaches the expiry task, cancelling any previous one.
    pub fn set_expiry(&mut self, handle: JoinHandle<()>) {
        if let Some(previous) = self.expiry.replace(handle) {
            previous.abort();
        }
    }

    /// Returns true if an expiry is scheduled for this entry.
    pub fn expires(&self) -> bool {
        self.expiry.is_some()
    }
}

impl<V> Drop for CacheEntry<V> {
    fn drop(&mut self) {
        if let Some(handle) = self.expiry.take() {
            handle.abort();
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new("test_value".to_string(), 7, 1);

        assert_eq!(entry.value, "test_value");
        assert_eq!(entry.generation, 7);
        assert_eq!(entry.access_seq, 1);
        assert!(!entry.expires());
    }

    #[test]
    fn test_touch_advances_access() {
        let mut entry = CacheEntry::new(1u32, 0, 1);
        let before = entry.last_access;

        entry.touch(5);

        assert_eq!(entry.access_seq, 5);
        assert!(entry.last_access >= before);
    }

    #[tokio::test]
    async fn test_drop_aborts_expiry() {
        let mut entry = CacheEntry::new(1u32, 0, 1);
        let handle = tokio::spawn(tokio::time::sleep(Duration::from_secs(60)));
        let abort = handle.abort_handle();
        entry.set_expiry(handle);
        assert!(entry.expires());

        drop(entry);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(abort.is_finished(), "Expiry task should be cancelled on drop");
    }

    #[tokio::test]
    async fn test_replacing_expiry_aborts_previous() {
        let mut entry = CacheEntry::new(1u32, 0, 1);
        let first = tokio::spawn(tokio::time::sleep(Duration::from_secs(60)));
        let first_abort = first.abort_handle();

        entry.set_expiry(first);
        entry.set_expiry(tokio::spawn(tokio::time::sleep(Duration::from_secs(60))));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(first_abort.is_finished());
        assert!(entry.expires());
    }
}
