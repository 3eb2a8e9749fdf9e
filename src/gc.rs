use crate::keyspace::Keyspace;
use crate::store::Store;
use crate::{time, Result};
use tracing::debug;

/// Deletes abandoned leases: every key in the namespace whose expiry is at or
/// before `now`, among the first `limit` entries of the scan. Returns how
/// many were reclaimed.
///
/// Advisory housekeeping only. The acquire path reclaims expired leases
/// lazily on contact; this pass exists to bound key growth from namespaces
/// whose owners never come back. The `limit` cap bounds the worst-case cost
/// of one pass, at the expense of completeness on very large namespaces.
pub async fn clean_deadlocks(store: &dyn Store, keys: &Keyspace, limit: usize) -> Result<usize> {
    let now = time::epoch_millis();
    let found = store.keys_by_pattern(&keys.pattern()).await?;
    if found.is_empty() {
        return Ok(0);
    }

    let expiries = store.multi_get(&found).await?;
    // A value that vanished between the scan and the batch read counts as
    // expired; deleting its key again is a no-op.
    let expired: Vec<String> = found
        .into_iter()
        .zip(expiries)
        .take(limit)
        .filter(|(_, expiry)| expiry.unwrap_or(0) <= now)
        .map(|(key, _)| key)
        .collect();
    if expired.is_empty() {
        return Ok(0);
    }

    store.delete_many(&expired).await?;
    debug!(namespace = %keys.prefix(), reclaimed = expired.len(), "cleaned dead leases");
    Ok(expired.len())
}
