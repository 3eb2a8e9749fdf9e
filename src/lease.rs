use crate::keyspace::{Keyspace, RELEASE_PAYLOAD};
use crate::store::Store;
use crate::{time, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Outcome of one acquire attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// This caller now holds the lease.
    Acquired,
    /// Someone else holds it. `retry_after` is the observed remaining
    /// lifetime — the longest a waiter needs to sleep before the lease is
    /// free again even if no release is ever announced. Zero when the
    /// attempt lost a reclaim race and should retry immediately.
    Held { retry_after: Duration },
}

/// Race-safe acquire/release against a single store.
///
/// A lease is nothing but an absolute expiry timestamp stored at the lease
/// key. Whoever writes it owns the lease until it expires or is deleted;
/// there is no owner id, so the release below frees the key for anyone.
#[derive(Debug, Clone)]
pub struct LeaseManager {
    store: Arc<dyn Store>,
    keys: Keyspace,
}

impl LeaseManager {
    pub fn new(store: Arc<dyn Store>, keys: Keyspace) -> Self {
        Self { store, keys }
    }

    /// Attempts to take the lease on `name` for `lifetime`.
    ///
    /// Fast path is an atomic set-if-absent of the new expiry. When the key
    /// already exists, an expiry in the past is reclaimed with an atomic
    /// swap: the claim only counts if the swap's reported prior value is
    /// exactly the stale expiry just observed; otherwise another process got
    /// there first. An expiry still in the future means the lease is
    /// legitimately held.
    pub async fn acquire(&self, name: &str, lifetime: Duration) -> Result<Acquire> {
        let key = self.keys.key(name);
        let now = time::epoch_millis();
        let deadline = now + lifetime.as_millis() as i64;

        if self.store.set_if_absent(&key, deadline).await? {
            return Ok(Acquire::Acquired);
        }

        let observed = self.store.get(&key).await?;
        match observed {
            Some(expires_at) if expires_at >= now => Ok(Acquire::Held {
                retry_after: Duration::from_millis((expires_at - now) as u64),
            }),
            // Expired, or deleted between the two round-trips: reclaim,
            // conditional on nobody having swapped the value in the meantime.
            stale => {
                let prior = self.store.get_set(&key, deadline).await?;
                if prior == stale {
                    debug!(key = %key, stale = ?stale, "reclaimed expired lease");
                    Ok(Acquire::Acquired)
                } else {
                    Ok(Acquire::Held {
                        retry_after: Duration::ZERO,
                    })
                }
            }
        }
    }

    /// Releases the lease on `name`: deletes the key and announces the
    /// release on its channel as one atomic unit.
    ///
    /// Anyone can release any lease; callers are trusted to only release
    /// what they acquired.
    pub async fn release(&self, name: &str) -> Result<()> {
        self.store
            .delete_and_publish(
                &self.keys.key(name),
                &self.keys.free_channel(name),
                RELEASE_PAYLOAD,
            )
            .await
    }
}
