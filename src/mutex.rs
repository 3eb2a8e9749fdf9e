use crate::config::MutexConfig;
use crate::gc;
use crate::keyspace::Keyspace;
use crate::lease::{Acquire, LeaseManager};
use crate::redis_store::RedisStore;
use crate::store::Store;
use crate::waiter::wait_for_release;
use crate::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// What a conditional check tells the orchestrator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate<T> {
    /// Go ahead and attempt the lock.
    Proceed,
    /// Skip the lock entirely and deliver this value as the result.
    ShortCircuit(T),
}

/// Result of a single-shot isolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The lease was acquired, the work ran exclusively, and this is what it
    /// produced.
    Done(T),
    /// The lease was held by someone else; the work never ran.
    Busy,
}

impl<T> Outcome<T> {
    pub fn is_busy(&self) -> bool {
        matches!(self, Outcome::Busy)
    }

    /// The work's result, if it ran.
    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            Outcome::Busy => None,
        }
    }
}

/// Cooperative lease-based distributed mutex over a shared store.
///
/// Serializes access to a named critical section across independent
/// processes. A holder that crashes blocks others only until its lease
/// lifetime runs out; nothing is held forever.
///
/// ```no_run
/// use remutex::{Mutex, MutexConfig};
/// use std::time::Duration;
///
/// # async fn example() -> remutex::Result<()> {
/// let mutex = Mutex::new(MutexConfig::default())?;
/// let report = mutex
///     .isolate_retry("nightly-report", Duration::from_secs(30), || async {
///         // Only one process at a time gets here.
///         "done"
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Mutex {
    store: Arc<dyn Store>,
    lease: LeaseManager,
    keys: Keyspace,
    gc_limit: usize,
}

impl Mutex {
    /// Connects to the store described by `config`. Fails fast on an invalid
    /// configuration; the connections themselves are established lazily on
    /// first use.
    pub fn new(config: MutexConfig) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(RedisStore::new(&config)?);
        Ok(Self::with_store(store, &config))
    }

    /// Builds a mutex on a caller-supplied store, e.g. the in-memory store
    /// from [`test_utils`](crate::test_utils) or a shared client.
    pub fn with_store(store: Arc<dyn Store>, config: &MutexConfig) -> Self {
        let keys = Keyspace::new(&config.prefix, &config.ns);
        Self {
            lease: LeaseManager::new(Arc::clone(&store), keys.clone()),
            store,
            keys,
            gc_limit: config.gc_limit,
        }
    }

    /// One raw acquire attempt on `key` for `lifetime`. Exposed for callers
    /// composing their own locking patterns; the `isolate` family is built
    /// on this.
    pub async fn lock(&self, key: &str, lifetime: Duration) -> Result<Acquire> {
        self.lease.acquire(key, lifetime).await
    }

    /// Releases `key` and announces the release to any waiters.
    pub async fn free(&self, key: &str) -> Result<()> {
        self.lease.release(key).await
    }

    /// Runs `work` under the lease on `key`, or reports
    /// [`Outcome::Busy`] without retrying when the lease is taken.
    pub async fn isolate<W, Fut, T>(
        &self,
        key: &str,
        lifetime: Duration,
        work: W,
    ) -> Result<Outcome<T>>
    where
        W: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        match self.lease.acquire(key, lifetime).await? {
            Acquire::Acquired => Ok(Outcome::Done(self.run_exclusive(key, work).await)),
            Acquire::Held { .. } => Ok(Outcome::Busy),
        }
    }

    /// Runs `work` under the lease on `key`, waiting for the current holder
    /// to release (or its lease to expire) as many times as it takes.
    ///
    /// There is no attempt cap and no backoff beyond the natural
    /// wait-for-release delay; a caller that must bound the wait should wrap
    /// this in a timeout.
    pub async fn isolate_retry<W, Fut, T>(&self, key: &str, lifetime: Duration, work: W) -> Result<T>
    where
        W: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        loop {
            match self.lease.acquire(key, lifetime).await? {
                Acquire::Acquired => return Ok(self.run_exclusive(key, work).await),
                Acquire::Held { retry_after } => {
                    wait_for_release(
                        self.store.as_ref(),
                        &self.keys.free_channel(key),
                        retry_after,
                    )
                    .await;
                }
            }
        }
    }

    /// Like [`isolate`](Self::isolate), gated by `check`: when `check`
    /// yields [`Gate::ShortCircuit`], its value is delivered without the
    /// lease ever being touched.
    ///
    /// The usual shape: `check` consults some state that makes the critical
    /// section unnecessary (a cache hit, work already done) and short-circuits
    /// with the answer.
    pub async fn isolate_cond<C, CFut, W, WFut, T>(
        &self,
        key: &str,
        lifetime: Duration,
        check: C,
        work: W,
    ) -> Result<Outcome<T>>
    where
        C: FnOnce() -> CFut,
        CFut: Future<Output = Result<Gate<T>>>,
        W: FnOnce() -> WFut,
        WFut: Future<Output = T>,
    {
        match check().await? {
            Gate::Proceed => self.isolate(key, lifetime, work).await,
            Gate::ShortCircuit(value) => Ok(Outcome::Done(value)),
        }
    }

    /// Like [`isolate_cond`](Self::isolate_cond) with the retrying lock of
    /// [`isolate_retry`](Self::isolate_retry). `check` gates entry exactly
    /// once; contention retries the lock attempt only.
    pub async fn isolate_cond_retry<C, CFut, W, WFut, T>(
        &self,
        key: &str,
        lifetime: Duration,
        check: C,
        work: W,
    ) -> Result<T>
    where
        C: FnOnce() -> CFut,
        CFut: Future<Output = Result<Gate<T>>>,
        W: FnOnce() -> WFut,
        WFut: Future<Output = T>,
    {
        match check().await? {
            Gate::Proceed => self.isolate_retry(key, lifetime, work).await,
            Gate::ShortCircuit(value) => Ok(value),
        }
    }

    /// Deletes expired leases left behind by callers that never came back,
    /// up to the configured batch cap per pass. Returns how many were
    /// reclaimed.
    pub async fn clean_deadlocks(&self) -> Result<usize> {
        gc::clean_deadlocks(self.store.as_ref(), &self.keys, self.gc_limit).await
    }

    /// Runs the acquired work, then releases. A failed release is logged and
    /// swallowed: the lease will expire on its own, and the work's result
    /// must still reach the caller.
    async fn run_exclusive<W, Fut, T>(&self, key: &str, work: W) -> T
    where
        W: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let result = work().await;
        if let Err(err) = self.lease.release(key).await {
            warn!(key, error = %err, "failed to release lease, it will expire on its own");
        }
        result
    }
}
