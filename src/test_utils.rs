use crate::error::{Error, Result};
use crate::router::{Router, Watch};
use crate::store::Store;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// In-process store with the same atomic semantics as the real backend:
/// set-if-absent, get-and-set, transactional delete-and-publish. Each
/// operation takes the map lock once, so its atomicity is at least as strong
/// as the store's.
///
/// `set_offline(true)` makes every subsequent round-trip fail, simulating the
/// store becoming unreachable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, i64>>,
    router: Arc<Router>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a raw lease value, bypassing the protocol. Lets tests construct
    /// already-expired or corrupted-by-time states directly.
    pub fn put(&self, key: &str, value: i64) {
        self.data.lock().insert(key.to_string(), value);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn key_count(&self) -> usize {
        self.data.lock().len()
    }

    fn round_trip(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Store("store offline (simulated)".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn set_if_absent(&self, key: &str, value: i64) -> Result<bool> {
        self.round_trip()?;
        let mut data = self.data.lock();
        if data.contains_key(key) {
            Ok(false)
        } else {
            data.insert(key.to_string(), value);
            Ok(true)
        }
    }

    async fn get(&self, key: &str) -> Result<Option<i64>> {
        self.round_trip()?;
        Ok(self.data.lock().get(key).copied())
    }

    async fn get_set(&self, key: &str, value: i64) -> Result<Option<i64>> {
        self.round_trip()?;
        Ok(self.data.lock().insert(key.to_string(), value))
    }

    async fn delete_and_publish(&self, key: &str, channel: &str, _payload: &str) -> Result<()> {
        self.round_trip()?;
        let mut data = self.data.lock();
        data.remove(key);
        // Publish inside the lock so no one can observe the key still
        // present after being woken.
        self.router.dispatch(channel);
        Ok(())
    }

    async fn keys_by_pattern(&self, pattern: &str) -> Result<Vec<String>> {
        self.round_trip()?;
        let prefix = pattern.strip_suffix('*').unwrap_or(pattern);
        Ok(self
            .data
            .lock()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<i64>>> {
        self.round_trip()?;
        let data = self.data.lock();
        Ok(keys.iter().map(|key| data.get(key).copied()).collect())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<()> {
        self.round_trip()?;
        let mut data = self.data.lock();
        for key in keys {
            data.remove(key);
        }
        Ok(())
    }

    async fn watch(&self, channel: &str) -> Result<Watch> {
        self.round_trip()?;
        let (watch, _first) = self.router.register(channel);
        Ok(watch)
    }
}

/// Installs a global tracing subscriber honoring `RUST_LOG`. Safe to call
/// from every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
