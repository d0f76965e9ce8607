//! Shared helpers for unit tests.

use crate::error::{MetaLockError, Result};
use crate::primitive::{LockHandle, LockPrimitive};
use crate::store::{BackingStore, MemoryStore, Ttl};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub(crate) fn memory_stores(count: usize) -> (Vec<Arc<MemoryStore>>, Vec<Arc<dyn BackingStore>>) {
    let concrete: Vec<Arc<MemoryStore>> = (0..count)
        .map(|i| Arc::new(MemoryStore::new(format!("mem-{}", i))))
        .collect();
    let dynamic = concrete
        .iter()
        .map(|s| s.clone() as Arc<dyn BackingStore>)
        .collect();
    (concrete, dynamic)
}

/// Wraps a store and delays every call.
pub(crate) struct DelayedStore {
    inner: Arc<dyn BackingStore>,
    delay: Duration,
}

impl DelayedStore {
    pub(crate) fn new(inner: Arc<dyn BackingStore>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl BackingStore for DelayedStore {
    fn label(&self) -> String {
        format!("delayed:{}", self.inner.label())
    }

    async fn time_to_live(&self, key: &str) -> Result<Ttl> {
        tokio::time::sleep(self.delay).await;
        self.inner.time_to_live(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, value, ttl).await
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn delete_if(
        &self,
        key: &str,
        predicate: &(dyn for<'v> Fn(&'v [u8]) -> bool + Send + Sync),
    ) -> Result<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete_if(key, predicate).await
    }
}

/// Primitive with a single in-process slot, for facade tests that do not
/// care about stores.
#[derive(Clone)]
pub(crate) struct FakePrimitive {
    name: String,
    held: Arc<AtomicBool>,
}

impl FakePrimitive {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            held: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    fn try_take(&self) -> Option<FakeHandle> {
        self.held
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| FakeHandle {
                name: self.name.clone(),
                held: self.held.clone(),
            })
    }

    async fn wait(&self, timeout: Option<Duration>, cancel: &CancellationToken) -> Result<FakeHandle> {
        let deadline = timeout.and_then(|t| tokio::time::Instant::now().checked_add(t));
        loop {
            if cancel.is_cancelled() {
                return Err(MetaLockError::Cancelled {
                    name: self.name.clone(),
                    holder: Default::default(),
                });
            }
            if let Some(handle) = self.try_take() {
                return Ok(handle);
            }
            if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                return Err(MetaLockError::Timeout {
                    name: self.name.clone(),
                    holder: Default::default(),
                });
            }
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_millis(5)) => {}
            }
        }
    }
}

pub(crate) struct FakeHandle {
    name: String,
    held: Arc<AtomicBool>,
}

#[async_trait]
impl LockHandle for FakeHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn release(self) -> Result<()> {
        self.held.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl LockPrimitive for FakePrimitive {
    type Handle = FakeHandle;

    fn name(&self) -> &str {
        &self.name
    }

    async fn try_acquire(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<FakeHandle>> {
        match self.wait(Some(timeout), cancel).await {
            Ok(handle) => Ok(Some(handle)),
            Err(MetaLockError::Timeout { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn acquire(
        &self,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<FakeHandle> {
        self.wait(timeout, cancel).await
    }
}
