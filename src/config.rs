use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Characters with glob meaning in the store's key-pattern scans. A prefix or
/// namespace containing one would corrupt the deadlock-cleanup scan.
const PATTERN_META: &[char] = &['*', '?', '[', ']'];

/// Configuration for a [`Mutex`](crate::Mutex). Immutable after construction.
///
/// Any field left at its default matches the defaults of the store-side
/// convention: keys under `lock/default/`, a local store on port 6379 and a
/// garbage-collection batch cap of 100 keys per pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutexConfig {
    /// First key segment, shared by every namespace.
    pub prefix: String,
    /// Namespace segment isolating unrelated lock sets from each other.
    pub ns: String,
    /// Store host.
    pub host: String,
    /// Store port.
    pub port: u16,
    /// Optional store credential.
    pub auth: Option<String>,
    /// Upper bound on lease keys considered per `clean_deadlocks` pass.
    pub gc_limit: usize,
}

impl Default for MutexConfig {
    fn default() -> Self {
        Self {
            prefix: "lock".to_string(),
            ns: "default".to_string(),
            host: "127.0.0.1".to_string(),
            port: 6379,
            auth: None,
            gc_limit: 100,
        }
    }
}

impl MutexConfig {
    /// Fails fast on values that would silently misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("prefix", &self.prefix), ("ns", &self.ns)] {
            if value.is_empty() {
                return Err(Error::Config(format!("{field} must not be empty")));
            }
            if value.contains(PATTERN_META) {
                return Err(Error::Config(format!(
                    "{field} {value:?} contains pattern metacharacters"
                )));
            }
        }
        if self.host.is_empty() {
            return Err(Error::Config("host must not be empty".to_string()));
        }
        Ok(())
    }

    /// Connection URL for the store client.
    pub fn url(&self) -> String {
        match &self.auth {
            Some(auth) => format!("redis://:{}@{}:{}/", auth, self.host, self.port),
            None => format!("redis://{}:{}/", self.host, self.port),
        }
    }
}
