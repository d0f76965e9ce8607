//! Lock primitive abstraction.
//!
//! The facade treats the distributed mutex as a capability: anything that can
//! try-acquire or acquire a named lock with a timeout and a cancellation token,
//! handing back a releasable handle. `QuorumLock` is the bundled
//! implementation over backing stores; tests substitute fakes.

mod quorum;


use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use quorum::{QuorumHandle, QuorumLock, QuorumOptions};

/// Proof of ownership over a lock name.
///
/// Releasing (or letting the lock's TTL run out) ends the exclusion window.
#[async_trait]
pub trait LockHandle: Send + Sync + 'static {
    /// The lock name this handle owns.
    fn name(&self) -> &str;

    /// Give the lock up.
    async fn release(self) -> Result<()>;
}

/// A distributed mutual-exclusion algorithm for one lock name.
#[async_trait]
pub trait LockPrimitive: Send + Sync {
    /// The handle type returned on success.
    type Handle: LockHandle;

    /// The lock name.
    fn name(&self) -> &str;

    /// Try to acquire within `timeout`.
    ///
    /// Returns `Ok(None)` when the lock stayed busy until the timeout, and
    /// `Err(MetaLockError::Cancelled)` when `cancel` fired first.
    async fn try_acquire(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<Self::Handle>>;

    /// Acquire, waiting up to `timeout` (`None` waits indefinitely).
    ///
    /// Fails with `MetaLockError::Timeout` or `MetaLockError::Cancelled`.
    async fn acquire(
        &self,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Self::Handle>;
}
