//! The `MetaLock` facade.

use super::types::{AcquireFailure, LockOptions, MetaAcquisition, MetaGrant, MetadataReport};
use crate::error::{MetaLockError, Result};
use crate::metadata::{
    ContextSnapshot, MetadataOptions, OwnershipRecord, OwnershipStore, ReadReport, WriteReport,
};
use crate::primitive::{LockHandle, LockPrimitive, QuorumLock};
use crate::store::BackingStore;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;

/// Distributed lock that records who holds it.
///
/// Successful acquisitions write an ownership record to every backing store;
/// failed ones read the current holder's record back. Metadata I/O is
/// best-effort and never changes the outcome of an acquisition.
pub struct MetaLock<P: LockPrimitive = QuorumLock> {
    primitive: P,
    ownership: OwnershipStore,
    blocking: OnceLock<Runtime>,
}

impl MetaLock<QuorumLock> {
    /// Lock named `name` over `stores`, stamping `metadata` on every
    /// acquisition.
    pub fn new(
        name: impl Into<String>,
        stores: Vec<Arc<dyn BackingStore>>,
        metadata: OwnershipRecord,
        options: LockOptions,
    ) -> Result<Self> {
        let name = name.into();
        let primitive = QuorumLock::new(name, stores.clone(), options.quorum)?;
        Self::with_primitive(primitive, stores, metadata, options.metadata)
    }
}

impl<P: LockPrimitive> MetaLock<P> {
    /// Compose an arbitrary primitive with the metadata channel on `stores`.
    pub fn with_primitive(
        primitive: P,
        stores: Vec<Arc<dyn BackingStore>>,
        metadata: OwnershipRecord,
        options: MetadataOptions,
    ) -> Result<Self> {
        let ownership = OwnershipStore::new(primitive.name(), stores, metadata, options)?;
        Ok(Self {
            primitive,
            ownership,
            blocking: OnceLock::new(),
        })
    }

    pub fn name(&self) -> &str {
        self.primitive.name()
    }

    /// The caller-fixed metadata stamped on every acquisition.
    pub fn metadata(&self) -> &OwnershipRecord {
        self.ownership.fixed()
    }

    pub fn primitive(&self) -> &P {
        &self.primitive
    }

    /// Read the current ownership record without trying to acquire.
    pub async fn read_ownership(&self) -> ReadReport {
        self.ownership.read_ownership().await
    }

    // ------------------------------------------------------------------
    // Async surface
    // ------------------------------------------------------------------

    /// Try to acquire within `timeout`.
    ///
    /// Busy and cancelled outcomes are not errors: the handle is `None`,
    /// `failure` says which one happened, and `metadata` holds the current
    /// holder's record.
    pub async fn try_acquire_with_meta_async(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<MetaAcquisition<P::Handle>> {
        let failure = match self.primitive.try_acquire(timeout, cancel).await {
            Ok(Some(handle)) => {
                let report = self.record().await;
                return Ok(MetaAcquisition {
                    handle: Some(handle),
                    metadata: report.record.clone(),
                    failure: None,
                    report: MetadataReport::Written(report),
                });
            }
            Ok(None) => AcquireFailure::Busy,
            Err(MetaLockError::Cancelled { .. }) => AcquireFailure::Cancelled,
            Err(err) => return Err(err),
        };

        let report = self.ownership.read_ownership().await;
        tracing::debug!(
            lock = %self.name(),
            ?failure,
            holder = %report.record.summary(),
            "lock not acquired"
        );
        Ok(MetaAcquisition {
            handle: None,
            metadata: report.record.clone(),
            failure: Some(failure),
            report: MetadataReport::Read(report),
        })
    }

    /// Acquire, waiting up to `timeout` (`None` waits indefinitely).
    ///
    /// Timeout and cancellation are distinct errors and carry the holder's
    /// record. Once the handle is obtained the metadata write runs to
    /// completion regardless of `cancel`.
    pub async fn acquire_with_meta_async(
        &self,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<MetaGrant<P::Handle>> {
        match self.primitive.acquire(timeout, cancel).await {
            Ok(handle) => {
                let report = self.record().await;
                Ok(MetaGrant {
                    handle,
                    metadata: report.record.clone(),
                    report,
                })
            }
            Err(err @ (MetaLockError::Timeout { .. } | MetaLockError::Cancelled { .. })) => {
                let err = if cancel.is_cancelled() {
                    MetaLockError::Cancelled {
                        name: self.name().to_string(),
                        holder: OwnershipRecord::new(),
                    }
                } else {
                    err
                };
                let report = self.ownership.read_ownership().await;
                Err(err.with_holder(report.record))
            }
            Err(err) => Err(err),
        }
    }

    /// Handle-only variant of [`Self::try_acquire_with_meta_async`].
    pub async fn try_acquire_async(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<P::Handle>> {
        Ok(self
            .try_acquire_with_meta_async(timeout, cancel)
            .await?
            .handle)
    }

    /// Handle-only variant of [`Self::acquire_with_meta_async`].
    pub async fn acquire_async(
        &self,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<P::Handle> {
        Ok(self.acquire_with_meta_async(timeout, cancel).await?.handle)
    }

    // ------------------------------------------------------------------
    // Blocking surface
    // ------------------------------------------------------------------

    /// Blocking counterpart of [`Self::try_acquire_with_meta_async`].
    ///
    /// Must not be called from inside an async runtime.
    pub fn try_acquire_with_meta(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<MetaAcquisition<P::Handle>> {
        self.block_on(self.try_acquire_with_meta_async(timeout, cancel))?
    }

    /// Blocking counterpart of [`Self::acquire_with_meta_async`].
    ///
    /// Must not be called from inside an async runtime.
    pub fn acquire_with_meta(
        &self,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<MetaGrant<P::Handle>> {
        self.block_on(self.acquire_with_meta_async(timeout, cancel))?
    }

    pub fn try_acquire(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<P::Handle>> {
        Ok(self.try_acquire_with_meta(timeout, cancel)?.handle)
    }

    pub fn acquire(
        &self,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<P::Handle> {
        Ok(self.acquire_with_meta(timeout, cancel)?.handle)
    }

    /// Release a handle obtained through the blocking surface.
    pub fn release(&self, handle: P::Handle) -> Result<()> {
        self.block_on(handle.release())?
    }

    /// Blocking counterpart of [`Self::read_ownership`].
    pub fn read_ownership_blocking(&self) -> Result<ReadReport> {
        self.block_on(self.ownership.read_ownership())
    }

    pub(super) async fn record(&self) -> WriteReport {
        let context = ContextSnapshot::capture(self.ownership.options().capture_stack_trace);
        let report = self.ownership.record_ownership(&context).await;
        if !report.is_complete() {
            tracing::warn!(
                lock = %self.name(),
                written = report.written_count(),
                stores = report.outcomes.len(),
                "ownership metadata only partially written"
            );
        }
        report
    }

    fn block_on<F: Future>(&self, future: F) -> Result<F::Output> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(MetaLockError::Runtime(
                "blocking lock call made from inside an async runtime; use the async variant"
                    .to_string(),
            ));
        }

        let runtime = match self.blocking.get() {
            Some(runtime) => runtime,
            None => {
                let runtime = Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| {
                        MetaLockError::Runtime(format!("failed to start blocking runtime: {}", e))
                    })?;
                // A concurrent caller may have won the race; either runtime works.
                let _ = self.blocking.set(runtime);
                self.blocking.get().ok_or_else(|| {
                    MetaLockError::Runtime("blocking runtime unavailable".to_string())
                })?
            }
        };
        Ok(runtime.block_on(future))
    }
}
