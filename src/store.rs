use crate::router::Watch;
use crate::Result;
use async_trait::async_trait;

/// Atomic operations the locking protocol needs from the shared store.
///
/// The store is the sole source of cross-process mutual exclusion: every
/// method here is a single round-trip whose atomicity is the backing store's
/// responsibility. Implementations must not retry internally; a failed
/// round-trip surfaces as [`Error::Store`](crate::Error::Store) to the caller
/// that issued it.
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Creates `key` holding `value` iff it does not exist. True iff this
    /// call created it.
    async fn set_if_absent(&self, key: &str, value: i64) -> Result<bool>;

    /// Current value of `key`, or `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<i64>>;

    /// Atomically writes `value` and returns the prior value. The caller
    /// compares the prior value against what it last observed to detect a
    /// lost race.
    async fn get_set(&self, key: &str, value: i64) -> Result<Option<i64>>;

    /// Deletes `key` and publishes `payload` on `channel` as one atomic
    /// unit, so a woken waiter can never observe the key still present.
    async fn delete_and_publish(&self, key: &str, channel: &str, payload: &str) -> Result<()>;

    /// All keys matching the glob `pattern`.
    async fn keys_by_pattern(&self, pattern: &str) -> Result<Vec<String>>;

    /// Values for `keys`, same order and length, `None` for absent keys.
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<i64>>>;

    /// Deletes every key in `keys`.
    async fn delete_many(&self, keys: &[String]) -> Result<()>;

    /// Registers for the next message published on `channel`.
    async fn watch(&self, channel: &str) -> Result<Watch>;
}
