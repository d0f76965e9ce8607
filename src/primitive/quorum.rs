//! Majority-vote lock over independent backing stores.

use super::{LockHandle, LockPrimitive};
use crate::error::{MetaLockError, Result};
use crate::metadata::{ORIGINAL_VALUE_KEY, codec};
use crate::store::BackingStore;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const MAX_RECORD_NESTING: usize = 8;

/// Tuning for [`QuorumLock`].
#[derive(Debug, Clone)]
pub struct QuorumOptions {
    /// TTL of the lock key on every store.
    pub expiry: Duration,

    /// Pause between acquisition attempts while the lock is busy.
    pub retry_interval: Duration,
}

impl Default for QuorumOptions {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(30),
            retry_interval: Duration::from_millis(50),
        }
    }
}

/// Lock that holds a name once a majority of stores accepted a fresh token.
///
/// Each attempt writes a random token with `set_if_absent` to all stores at
/// once. Without a majority inside the expiry window the partial claims are
/// rolled back and the attempt counts as busy.
pub struct QuorumLock {
    name: String,
    stores: Vec<Arc<dyn BackingStore>>,
    options: QuorumOptions,
}

impl QuorumLock {
    pub fn new(
        name: impl Into<String>,
        stores: Vec<Arc<dyn BackingStore>>,
        options: QuorumOptions,
    ) -> Result<Self> {
        if stores.is_empty() {
            return Err(MetaLockError::Config(
                "at least one backing store is required".to_string(),
            ));
        }
        if options.expiry.is_zero() {
            return Err(MetaLockError::Config(
                "lock expiry must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            name: name.into(),
            stores,
            options,
        })
    }

    pub fn stores(&self) -> &[Arc<dyn BackingStore>] {
        &self.stores
    }

    pub fn options(&self) -> &QuorumOptions {
        &self.options
    }

    /// Number of stores that must accept a token.
    pub fn quorum(&self) -> usize {
        self.stores.len() / 2 + 1
    }

    async fn attempt(&self) -> Option<QuorumHandle> {
        let token = Uuid::new_v4().to_string();
        let started = Instant::now();

        let results = join_all(self.stores.iter().map(|store| {
            store.set_if_absent(&self.name, token.as_bytes().to_vec(), self.options.expiry)
        }))
        .await;

        let mut granted = 0;
        for (store, result) in self.stores.iter().zip(&results) {
            match result {
                Ok(true) => granted += 1,
                Ok(false) => {}
                Err(err) => tracing::debug!(
                    lock = %self.name,
                    store = %store.label(),
                    error = %err,
                    "lock claim failed on store"
                ),
            }
        }

        if granted >= self.quorum() && started.elapsed() < self.options.expiry {
            tracing::debug!(lock = %self.name, granted, "lock acquired");
            return Some(QuorumHandle {
                name: self.name.clone(),
                token,
                stores: self.stores.clone(),
                released: false,
            });
        }

        if granted > 0 {
            delete_owned(&self.stores, &self.name, &token).await;
        }
        None
    }

    async fn acquire_until(
        &self,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> Result<Option<QuorumHandle>> {
        loop {
            if cancel.is_cancelled() {
                return Err(self.cancelled());
            }
            if let Some(handle) = self.attempt().await {
                return Ok(Some(handle));
            }

            let now = Instant::now();
            let pause = match deadline {
                Some(deadline) if now >= deadline => return Ok(None),
                Some(deadline) => self.options.retry_interval.min(deadline - now),
                None => self.options.retry_interval,
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled()),
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    fn cancelled(&self) -> MetaLockError {
        MetaLockError::Cancelled {
            name: self.name.clone(),
            holder: Default::default(),
        }
    }
}

#[async_trait]
impl LockPrimitive for QuorumLock {
    type Handle = QuorumHandle;

    fn name(&self) -> &str {
        &self.name
    }

    async fn try_acquire(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<QuorumHandle>> {
        self.acquire_until(Instant::now().checked_add(timeout), cancel)
            .await
    }

    async fn acquire(
        &self,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<QuorumHandle> {
        // A timeout too large to represent means no deadline.
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        self.acquire_until(deadline, cancel)
            .await?
            .ok_or_else(|| MetaLockError::Timeout {
                name: self.name.clone(),
                holder: Default::default(),
            })
    }
}

/// Handle returned by [`QuorumLock`].
///
/// Dropping an unreleased handle schedules the release on the current tokio
/// runtime; outside a runtime the keys are left to expire.
pub struct QuorumHandle {
    name: String,
    token: String,
    stores: Vec<Arc<dyn BackingStore>>,
    released: bool,
}

impl QuorumHandle {
    /// The random token claimed on the stores.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for QuorumHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuorumHandle")
            .field("name", &self.name)
            .field("token", &self.token)
            .field("stores", &self.stores.len())
            .finish()
    }
}

#[async_trait]
impl LockHandle for QuorumHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn release(mut self) -> Result<()> {
        self.released = true;
        let failures = delete_owned(&self.stores, &self.name, &self.token).await;
        if failures == self.stores.len() {
            return Err(MetaLockError::Store(format!(
                "failed to release lock '{}' on every store",
                self.name
            )));
        }
        Ok(())
    }
}

impl Drop for QuorumHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let stores = std::mem::take(&mut self.stores);
                let name = self.name.clone();
                let token = self.token.clone();
                runtime.spawn(async move {
                    delete_owned(&stores, &name, &token).await;
                });
            }
            Err(_) => tracing::warn!(
                lock = %self.name,
                "lock handle dropped outside a runtime; keys will expire by TTL"
            ),
        }
    }
}

/// Whether a stored value still belongs to `token`.
///
/// The metadata channel overwrites the token with an ownership record that
/// keeps the previous value under `originalValue`. Re-stamping nests records,
/// so the chain is followed down to the token.
pub(crate) fn owned_by(value: &[u8], token: &str) -> bool {
    let mut current = value.to_vec();
    for _ in 0..MAX_RECORD_NESTING {
        if current == token.as_bytes() {
            return true;
        }
        match codec::decode(Some(&current)) {
            Ok(Some(record)) => match record.get(ORIGINAL_VALUE_KEY) {
                Some(original) => current = original.as_bytes().to_vec(),
                None => return false,
            },
            _ => return false,
        }
    }
    false
}

/// Delete `key` on every store where `token` still owns it. Returns the number
/// of stores that failed.
async fn delete_owned(stores: &[Arc<dyn BackingStore>], key: &str, token: &str) -> usize {
    let predicate = |value: &[u8]| owned_by(value, token);
    let results = join_all(stores.iter().map(|store| store.delete_if(key, &predicate))).await;

    let mut failures = 0;
    for (store, result) in stores.iter().zip(results) {
        if let Err(err) = result {
            failures += 1;
            tracing::warn!(
                lock = %key,
                store = %store.label(),
                error = %err,
                "failed to release lock on store"
            );
        }
    }
    failures
}
