//! Entry Expiry Task
//!
//! Each entry populated with a TTL owns one of these tasks. The task sleeps
//! for the TTL and then runs its expiry action; readers never poll for
//! staleness.

use std::time::Duration;

use tokio::task::JoinHandle;

/// Spawns a task that runs `on_expire` once `ttl_secs` seconds have elapsed.
///
/// The returned handle is the entry's expiry handle: aborting it cancels the
/// pending expiry. `on_expire` must re-check that the entry it was scheduled
/// for is still the one in the table before removing anything.
///
/// Must be called from within a tokio runtime.
///
/// # Example
/// ```ignore
/// let handle = spawn_expiry_task(30, move || shared.expire(&key, generation));
/// // Entry cleared before the TTL elapsed:
/// handle.abort();
/// ```
pub fn spawn_expiry_task<F>(ttl_secs: u64, on_expire: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    let ttl = Duration::from_secs(ttl_secs);

    tokio::spawn(async move {
        tokio::time::sleep(ttl).await;
        on_expire();
    })
}
