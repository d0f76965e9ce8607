//! In-process backing store.

use super::{BackingStore, Ttl};
use crate::error::{MetaLockError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory TTL key-value store.
///
/// Expired entries are evicted lazily on access. `set_offline(true)` makes
/// every operation fail, which simulates an unreachable replica.
pub struct MemoryStore {
    label: String,
    entries: Mutex<HashMap<String, Entry>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Toggle simulated unavailability.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(MetaLockError::Store(format!(
                "store '{}' is unreachable",
                self.label
            )));
        }
        let mut entries = self.entries.lock().map_err(|_| {
            MetaLockError::Store(format!("store '{}' state poisoned", self.label))
        })?;
        let now = Instant::now();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(entries)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    fn label(&self) -> String {
        self.label.clone()
    }

    async fn time_to_live(&self, key: &str) -> Result<Ttl> {
        let entries = self.entries()?;
        Ok(match entries.get(key) {
            None => Ttl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => Ttl::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => Ttl::Expires(at.saturating_duration_since(Instant::now())),
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries()?;
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut entries = self.entries()?;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries()?;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(true)
    }

    async fn delete_if(
        &self,
        key: &str,
        predicate: &(dyn for<'v> Fn(&'v [u8]) -> bool + Send + Sync),
    ) -> Result<bool> {
        let mut entries = self.entries()?;
        match entries.get(key) {
            Some(entry) if predicate(&entry.value) => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
