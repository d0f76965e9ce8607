//! Meta-lock facade.
//!
//! Composes a lock primitive with the ownership metadata channel into one
//! acquire surface that always returns ownership metadata alongside the
//! (optional) handle:
//!
//! | | non-blocking | blocking |
//! |---|---|---|
//! | async | `try_acquire_with_meta_async` | `acquire_with_meta_async` |
//! | sync | `try_acquire_with_meta` | `acquire_with_meta` |
//!
//! ```no_run
//! use metalock::{MemoryStore, MetaLock, LockOptions, OwnershipRecord};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! let stores: Vec<Arc<dyn metalock::BackingStore>> = vec![Arc::new(MemoryStore::default())];
//! let meta: OwnershipRecord = [("app", "AAA")].into_iter().collect();
//! let lock = MetaLock::new("TestLock", stores, meta, LockOptions::default())?;
//!
//! let attempt = lock.try_acquire_with_meta(Duration::from_secs(10), &CancellationToken::new())?;
//! if attempt.handle.is_none() {
//!     println!("Resource is used by: {:?}", attempt.metadata.get("app"));
//! }
//! # Ok::<(), metalock::MetaLockError>(())
//! ```

mod facade;
mod types;


pub use facade::MetaLock;
pub use types::{AcquireFailure, LockOptions, MetaAcquisition, MetaGrant, MetadataReport};
