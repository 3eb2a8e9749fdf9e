use dashmap::DashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, OnceLock,
};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Per-process notification router.
///
/// Maps a release channel name to the set of one-shot waiters currently
/// registered for it. The store's message callback calls [`Router::dispatch`],
/// which drains and fires the whole set at once — every waiter wakes on the
/// same notification and all of them race the next acquire.
#[derive(Debug, Default)]
pub struct Router {
    channels: DashMap<String, Vec<(u64, oneshot::Sender<()>)>>,
    next_id: AtomicU64,
    unsub_tx: OnceLock<mpsc::UnboundedSender<String>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the unsubscribe hook, fired when the last watcher of a
    /// channel gives up without a notification arriving. Set once by the
    /// store's subscriber driver; a second call is ignored.
    pub fn set_unsubscriber(&self, tx: mpsc::UnboundedSender<String>) {
        let _ = self.unsub_tx.set(tx);
    }

    /// Registers a watcher for `channel`. The returned flag is true when the
    /// channel had no watchers before this call, i.e. the caller should
    /// subscribe the underlying store channel.
    pub fn register(self: &Arc<Self>, channel: &str) -> (Watch, bool) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let mut entry = self.channels.entry(channel.to_string()).or_default();
        let first = entry.is_empty();
        entry.push((id, tx));
        drop(entry);
        let watch = Watch {
            rx,
            router: Arc::clone(self),
            channel: channel.to_string(),
            id,
        };
        (watch, first)
    }

    /// Delivers a notification: drains every watcher of `channel` and wakes
    /// them all. Returns how many were woken.
    pub fn dispatch(&self, channel: &str) -> usize {
        match self.channels.remove(channel) {
            Some((_, watchers)) => {
                let woken = watchers.len();
                for (_, tx) in watchers {
                    let _ = tx.send(());
                }
                woken
            }
            None => 0,
        }
    }

    fn deregister(&self, channel: &str, id: u64) {
        let mut now_empty = false;
        if let Some(mut watchers) = self.channels.get_mut(channel) {
            watchers.retain(|(watcher_id, _)| *watcher_id != id);
            now_empty = watchers.is_empty();
        }
        if now_empty
            && self
                .channels
                .remove_if(channel, |_, watchers| watchers.is_empty())
                .is_some()
        {
            if let Some(tx) = self.unsub_tx.get() {
                let _ = tx.send(channel.to_string());
            }
        }
    }
}

/// A single registration with the router. Resolves at most once; dropping it
/// removes the registration, so a stale watcher from an earlier retry round
/// can never wake a later one.
#[derive(Debug)]
pub struct Watch {
    rx: oneshot::Receiver<()>,
    router: Arc<Router>,
    channel: String,
    id: u64,
}

impl Watch {
    /// Waits until the notification arrives or `timeout` elapses, whichever
    /// comes first.
    pub async fn released_or(mut self, timeout: Duration) {
        tokio::select! {
            res = &mut self.rx => {
                let _ = res;
            }
            () = tokio::time::sleep(timeout) => {}
        }
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.router.deregister(&self.channel, self.id);
    }
}
