//! Backing store abstraction for metalock.
//!
//! A backing store is one independent replica of a TTL-capable key-value
//! store. The lock primitive uses `set_if_absent` and `delete_if` to claim and
//! release keys; the ownership metadata channel uses `time_to_live`, `get` and
//! `set` to overwrite the lock key without disturbing its expiry.
//!
//! Every operation is independently failable. Callers on the metadata path
//! treat failures as best-effort and never let them fail an acquisition.

mod file;
mod memory;


use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key does not exist (or has already expired).
    Missing,
    /// The key exists and never expires.
    Persistent,
    /// The key exists and expires after the given duration.
    Expires(Duration),
}

impl Ttl {
    /// The expiry to re-apply when overwriting the key, or `None` if the key
    /// should not be written at all.
    ///
    /// `Some(None)` means "write without expiry".
    pub fn preserved_expiry(&self) -> Option<Option<Duration>> {
        match self {
            Ttl::Missing => None,
            Ttl::Persistent => Some(None),
            Ttl::Expires(remaining) if remaining.is_zero() => None,
            Ttl::Expires(remaining) => Some(Some(*remaining)),
        }
    }
}

/// A single TTL-capable key-value replica.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Human-readable identifier used in logs and reports.
    fn label(&self) -> String;

    /// Remaining time-to-live of `key`.
    async fn time_to_live(&self, key: &str) -> Result<Ttl>;

    /// Current raw value at `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Overwrite `key`. `ttl: None` stores the key without expiry.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Store `value` only if `key` is absent. Returns whether it was stored.
    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool>;

    /// Delete `key` if its current value satisfies `predicate`.
    ///
    /// The check and delete happen as one step with respect to other callers
    /// of the same store.
    async fn delete_if(
        &self,
        key: &str,
        predicate: &(dyn for<'v> Fn(&'v [u8]) -> bool + Send + Sync),
    ) -> Result<bool>;
}
