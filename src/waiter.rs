use crate::store::Store;
use std::time::Duration;
use tracing::debug;

/// Suspends the caller until a release is announced on `channel` or
/// `timeout` elapses, whichever comes first. Resolves, never errors.
///
/// The timeout is a correctness backstop, not a convenience: when the holder
/// crashed without releasing, no notification ever arrives, and the caller
/// passes the observed remaining lease lifetime here so it wakes exactly when
/// the lease would have expired anyway. If even the subscription cannot be
/// set up, degrade to sleeping out the timeout.
pub async fn wait_for_release(store: &dyn Store, channel: &str, timeout: Duration) {
    match store.watch(channel).await {
        Ok(watch) => watch.released_or(timeout).await,
        Err(err) => {
            debug!(channel, error = %err, "subscribe failed, sleeping out the lease instead");
            tokio::time::sleep(timeout).await;
        }
    }
}
