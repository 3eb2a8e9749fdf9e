/// Suffix appended to a lease key to form its release-notification channel.
pub const FREE_SUFFIX: &str = "/free";

/// Payload published on the release channel. Waiters only care that a message
/// arrived, not what it says.
pub const RELEASE_PAYLOAD: &str = "1";

/// Maps logical lock names to fully-qualified storage keys.
///
/// Layout: lease key `<prefix>/<ns>/<name>`, release channel
/// `<prefix>/<ns>/<name>/free`, scan pattern `<prefix>/<ns>/*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    prefix: String,
    ns: String,
}

impl Keyspace {
    pub fn new(prefix: &str, ns: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            ns: ns.to_string(),
        }
    }

    /// The namespace prefix shared by every lease key: `<prefix>/<ns>`.
    pub fn prefix(&self) -> String {
        format!("{}/{}", self.prefix, self.ns)
    }

    /// Storage key holding the lease expiry for `name`.
    pub fn key(&self, name: &str) -> String {
        format!("{}/{}", self.prefix(), name)
    }

    /// Pub/sub channel a release of `name` is announced on.
    pub fn free_channel(&self, name: &str) -> String {
        format!("{}{}", self.key(name), FREE_SUFFIX)
    }

    /// Wildcard pattern matching every lease key in the namespace.
    pub fn pattern(&self) -> String {
        format!("{}/*", self.prefix())
    }
}
