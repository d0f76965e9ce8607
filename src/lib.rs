//! metalock: a distributed mutex that records who holds it.
//!
//! A [`MetaLock`] wraps a lock primitive (by default a majority-vote
//! [`QuorumLock`] over independent TTL key-value stores). On success it
//! stamps an ownership record onto the lock key of every store; on failure
//! it reads the current holder's record back, so a failed contender can say
//! who is in the way.
//!
//! Metadata I/O is best-effort. It never changes whether an acquisition
//! succeeds, and its per-store outcomes are reported, not raised.

pub mod config;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod logging;
pub mod meta_lock;
pub mod metadata;
pub mod primitive;
pub mod store;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{MetaLockError, Result};
pub use meta_lock::{
    AcquireFailure, LockOptions, MetaAcquisition, MetaGrant, MetaLock, MetadataReport,
};
pub use metadata::{
    ContextSnapshot, MetadataOptions, OwnershipRecord, OwnershipStore, ReadReport, WriteReport,
};
pub use primitive::{LockHandle, LockPrimitive, QuorumHandle, QuorumLock, QuorumOptions};
pub use store::{BackingStore, FileStore, MemoryStore, Ttl};
pub use tokio_util::sync::CancellationToken;
